// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the app-routing operator core.
//!
//! This module provides specialized error types for:
//! - Kubernetes API calls made by the cleaner and resource reconciler
//! - REST mapping (GroupKind → GroupVersionResource resolution)
//! - Label selector construction
//! - Cleaner passes, configuration loading and runnable lifecycle
//!
//! API errors are classified once, at the client boundary, so callers can branch on
//! "not found" and "method not supported" without inspecting HTTP status codes.

use crate::gvk::GroupKind;
use thiserror::Error;

/// Errors returned by the cluster-facing client seams.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The object or collection does not exist (HTTP 404)
    ///
    /// Deleting something that is already gone is the desired end state, so callers
    /// performing deletes treat this as success.
    #[error("not found: {0}")]
    NotFound(String),

    /// The API server does not implement the verb for this resource (HTTP 405)
    ///
    /// Returned by `deletecollection` for kinds such as `Service`; the cleaner treats it
    /// as a signal to fall back to list-then-delete.
    #[error("method not supported: {0}")]
    MethodNotSupported(String),

    /// Any other API status returned by the server
    #[error("API error (HTTP {code}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Server-provided message
        message: String,
    },

    /// The object cannot be sent to the API (missing name, unserializable payload)
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// Transport, authentication or decoding failure below the API layer
    #[error("kubernetes client error: {0}")]
    Transport(#[source] kube::Error),
}

impl ClientError {
    /// Returns `true` if this error means the target does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if the server does not support the requested verb.
    #[must_use]
    pub fn is_method_not_supported(&self) -> bool {
        matches!(self, Self::MethodNotSupported(_))
    }
}

impl From<kube::Error> for ClientError {
    fn from(err: kube::Error) -> Self {
        let code = match &err {
            kube::Error::Api(response) => Some(response.code),
            _ => None,
        };

        match code {
            Some(404) => Self::NotFound(err.to_string()),
            Some(405) => Self::MethodNotSupported(err.to_string()),
            Some(code) => Self::Api {
                code,
                message: err.to_string(),
            },
            None => Self::Transport(err),
        }
    }
}

/// Errors raised while resolving abstract kinds to concrete resources.
#[derive(Error, Debug)]
pub enum MappingError {
    /// The discovery cache has no resource serving this GroupKind
    #[error("no matches for kind {0}")]
    NoMatch(GroupKind),

    /// Discovery itself failed
    #[error("API discovery failed: {0}")]
    Discovery(#[source] kube::Error),
}

/// Errors raised while turning a label map into a label selector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The label key is not a valid qualified name
    #[error("invalid label key {key:?}: {reason}")]
    InvalidKey {
        /// The offending key
        key: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The label value is not a valid label value
    #[error("invalid label value {value:?} for key {key:?}: {reason}")]
    InvalidValue {
        /// Key the value belongs to
        key: String,
        /// The offending value
        value: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// Errors from a single cleaner pass.
#[derive(Error, Debug)]
pub enum CleanerError {
    /// The component was configured incorrectly
    #[error("invalid cleaner configuration: {0}")]
    Config(String),

    /// Evaluating the retriever against the REST mapper failed
    #[error("retrieving clean types: {0}")]
    Retrieve(#[from] MappingError),

    /// A clean type's labels cannot be expressed as a selector
    #[error("building label selector: {0}")]
    Selector(#[from] SelectorError),

    /// An API call for one resource type failed
    #[error("cleaning {gvr}: {source}")]
    Clean {
        /// The resource type being cleaned
        gvr: String,
        /// The underlying client failure
        #[source]
        source: ClientError,
    },
}

/// Errors raised while loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be parsed
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// Errors that end a runnable or the manager hosting it.
#[derive(Error, Debug)]
pub enum RunError {
    /// The runnable was cancelled; this is the normal shutdown path
    #[error("context cancelled")]
    Cancelled,

    /// This replica lost the leader lease while leader-gated runnables were active
    #[error("leader election lost")]
    LeadershipLost,

    /// The leader election task stopped, so leadership can no longer be tracked
    #[error("leader election ended")]
    ElectionEnded,

    /// A runnable exited with an unexpected error
    #[error("runnable {name} failed: {reason}")]
    RunnableFailed {
        /// Runnable name
        name: String,
        /// Failure description
        reason: String,
    },

    /// Invalid wiring detected at construction time
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RunError {
    /// Returns `true` for the cancellation (clean shutdown) error.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
