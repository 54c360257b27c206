//! Cluster client errors
//!
//! Kubernetes API failures are classified once, here, so callers can decide
//! between "expected outcome", "retry" and "give up" without inspecting HTTP
//! status codes themselves.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create rejected because the object already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic concurrency failure: the object changed since it was read
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Authentication or authorization failure
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request rejected as malformed or failed validation
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Network failure, server-side error, throttling or server timeout
    #[error("Transient error: {0}")]
    Transient(String),

    /// Caller-supplied deadline expired before the call completed
    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Any other API response
    #[error("Kubernetes API error ({code}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Server message
        message: String,
    },
}

impl ClusterError {
    /// Whether the external scheduler should retry the reconcile later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_) | Self::Transient(_) | Self::DeadlineExceeded(_)
        )
    }

    /// Expected outcome of a lookup rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => match resp.code {
                404 => Self::NotFound(resp.message),
                409 if resp.reason == "AlreadyExists" => Self::AlreadyExists(resp.message),
                409 => Self::Conflict(resp.message),
                401 | 403 => Self::Forbidden(resp.message),
                400 | 422 => Self::Invalid(resp.message),
                429 | 500 | 502 | 503 | 504 => Self::Transient(resp.message),
                code => Self::Api {
                    code,
                    message: resp.message,
                },
            },
            // Everything below the API layer (connect, TLS, body read) is
            // treated as a connectivity problem.
            other => Self::Transient(other.to_string()),
        }
    }
}
