// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector construction and matching for owned-resource cleanup.
//!
//! The cleaner selects objects by equality on every label of a clean type. This module
//! turns such a label map into the selector query string the API server expects,
//! validating every key and value against Kubernetes label syntax first, so that a bad
//! label set fails before any request is sent.
//!
//! # Example
//!
//! ```rust
//! use app_routing_operator::selector::to_label_selector;
//! use std::collections::BTreeMap;
//!
//! let labels = BTreeMap::from([
//!     ("app.kubernetes.io/managed-by".to_string(), "app-routing-operator".to_string()),
//!     ("app.kubernetes.io/component".to_string(), "nginx".to_string()),
//! ]);
//! assert_eq!(
//!     to_label_selector(&labels).unwrap(),
//!     "app.kubernetes.io/component=nginx,app.kubernetes.io/managed-by=app-routing-operator"
//! );
//! ```

use crate::errors::SelectorError;
use std::collections::BTreeMap;

/// Maximum length of a label name and of a label value
const MAX_NAME_LEN: usize = 63;

/// Maximum length of a label key prefix (a DNS subdomain)
const MAX_PREFIX_LEN: usize = 253;

/// Build an equality-based selector (`k1=v1,k2=v2`, keys sorted) from a label map.
///
/// An empty map yields an empty selector, which matches everything.
///
/// # Errors
///
/// Returns [`SelectorError`] if any key or value violates Kubernetes label syntax.
pub fn to_label_selector(labels: &BTreeMap<String, String>) -> Result<String, SelectorError> {
    let mut terms = Vec::with_capacity(labels.len());
    for (key, value) in labels {
        validate_key(key)?;
        validate_value(key, value)?;
        terms.push(format!("{key}={value}"));
    }
    Ok(terms.join(","))
}

/// Returns `true` if `object_labels` carries every pair in `required`.
#[must_use]
pub fn matches_labels(
    required: &BTreeMap<String, String>,
    object_labels: &BTreeMap<String, String>,
) -> bool {
    required
        .iter()
        .all(|(key, value)| object_labels.get(key) == Some(value))
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason: &str| SelectorError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
                return Err(invalid("prefix must be 1-253 characters"));
            }
            if !is_dns_subdomain(prefix) {
                return Err(invalid("prefix must be a lowercase DNS subdomain"));
            }
            name
        }
        None => key,
    };

    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(invalid("name must be 1-63 characters"));
    }
    if !is_qualified_name_part(name) {
        return Err(invalid(
            "name must be alphanumeric at both ends with '-', '_' or '.' inside",
        ));
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<(), SelectorError> {
    if value.is_empty() {
        return Ok(());
    }
    let invalid = |reason: &str| SelectorError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.len() > MAX_NAME_LEN {
        return Err(invalid("must be at most 63 characters"));
    }
    if !is_qualified_name_part(value) {
        return Err(invalid(
            "must be alphanumeric at both ends with '-', '_' or '.' inside",
        ));
    }
    Ok(())
}

fn is_qualified_name_part(s: &str) -> bool {
    let bytes = s.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn is_dns_subdomain(s: &str) -> bool {
    s.split('.').all(|label| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                is_lower_alnum(*first)
                    && is_lower_alnum(*last)
                    && bytes.iter().all(|b| is_lower_alnum(*b) || *b == b'-')
            }
            _ => false,
        }
    })
}

fn is_lower_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
