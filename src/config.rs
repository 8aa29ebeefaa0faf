// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `POD_NAMESPACE` | `app-routing-system` |
//! | `POD_NAME`, then `HOSTNAME` | `app-routing-operator` |
//! | `LEADER_ELECTION_ENABLED` | `true` |
//! | `LEADER_ELECTION_LEASE_NAME` | `app-routing-operator-leader` |
//! | `LEADER_ELECTION_LEASE_DURATION_SECS` | `15` |
//! | `LEADER_ELECTION_GRACE_SECS` | `5` |
//! | `STATIC_RECONCILE_INTERVAL_SECS` | `300` |
//! | `CLEANER_MAX_RETRIES` | `3` |
//! | `OPERATOR_VERSION` | crate version |
//! | `INGRESS_CLASS_NAME` | `webapprouting.kubernetes.azure.com` |
//! | `METRICS_BIND_ADDRESS` | `0.0.0.0:8080` |

use crate::constants::{
    DEFAULT_CLEANER_MAX_RETRIES, DEFAULT_INGRESS_CLASS_NAME, DEFAULT_LEASE_DURATION_SECS,
    DEFAULT_LEASE_GRACE_SECS, DEFAULT_LEASE_NAME, DEFAULT_METRICS_BIND_ADDRESS,
    DEFAULT_OPERATOR_NAMESPACE, DEFAULT_STATIC_RECONCILE_INTERVAL_SECS, OPERATOR_NAME,
};
use crate::errors::ConfigError;
use crate::runtime::leader::LeaderElectionConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Everything the process needs to wire its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace the operator runs in and deploys into
    pub namespace: String,
    /// Leader election settings
    pub leader_election: LeaderElectionConfig,
    /// Steady-state interval of the static resource reconciler
    pub static_reconcile_interval: Duration,
    /// Retries after the first failed clean pass
    pub cleaner_max_retries: u32,
    /// Version written into ownership labels
    pub operator_version: String,
    /// Name of the default `IngressClass`
    pub ingress_class_name: String,
    /// Address of the metrics and health endpoint
    pub metrics_bind_address: SocketAddr,
}

impl OperatorConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let namespace =
            get("POD_NAMESPACE").unwrap_or_else(|| DEFAULT_OPERATOR_NAMESPACE.to_string());
        let identity = get("POD_NAME")
            .or_else(|| get("HOSTNAME"))
            .unwrap_or_else(|| OPERATOR_NAME.to_string());

        let leader_election = LeaderElectionConfig {
            enabled: parse_bool("LEADER_ELECTION_ENABLED", get("LEADER_ELECTION_ENABLED"), true)?,
            namespace: namespace.clone(),
            lease_name: get("LEADER_ELECTION_LEASE_NAME")
                .unwrap_or_else(|| DEFAULT_LEASE_NAME.to_string()),
            identity,
            lease_duration_secs: parse(
                "LEADER_ELECTION_LEASE_DURATION_SECS",
                get("LEADER_ELECTION_LEASE_DURATION_SECS"),
                DEFAULT_LEASE_DURATION_SECS,
            )?,
            grace_secs: parse(
                "LEADER_ELECTION_GRACE_SECS",
                get("LEADER_ELECTION_GRACE_SECS"),
                DEFAULT_LEASE_GRACE_SECS,
            )?,
        };

        if leader_election.grace_secs >= leader_election.lease_duration_secs {
            return Err(ConfigError::InvalidValue {
                key: "LEADER_ELECTION_GRACE_SECS".to_string(),
                value: leader_election.grace_secs.to_string(),
                reason: "must be shorter than the lease duration".to_string(),
            });
        }

        let interval_secs: u64 = parse(
            "STATIC_RECONCILE_INTERVAL_SECS",
            get("STATIC_RECONCILE_INTERVAL_SECS"),
            DEFAULT_STATIC_RECONCILE_INTERVAL_SECS,
        )?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "STATIC_RECONCILE_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            namespace,
            leader_election,
            static_reconcile_interval: Duration::from_secs(interval_secs),
            cleaner_max_retries: parse(
                "CLEANER_MAX_RETRIES",
                get("CLEANER_MAX_RETRIES"),
                DEFAULT_CLEANER_MAX_RETRIES,
            )?,
            operator_version: get("OPERATOR_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            ingress_class_name: get("INGRESS_CLASS_NAME")
                .unwrap_or_else(|| DEFAULT_INGRESS_CLASS_NAME.to_string()),
            metrics_bind_address: parse_value(
                "METRICS_BIND_ADDRESS",
                get("METRICS_BIND_ADDRESS")
                    .unwrap_or_else(|| DEFAULT_METRICS_BIND_ADDRESS.to_string()),
            )?,
        })
    }
}

fn parse<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => parse_value(key, value),
    }
}

fn parse_value<T>(key: &str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = value.trim().parse::<T>();
    match parsed {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
