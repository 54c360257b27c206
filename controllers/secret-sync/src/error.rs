//! Controller-specific error types.
//!
//! Object store failures arrive already classified as [`ClusterError`]; this
//! module adds the failures that originate in the controller itself.

use cluster_client::ClusterError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the secret-sync controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes object store error
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Mounted files under the pod's target path could not be listed
    #[error("Failed to read mounted files in {path}: {source}")]
    MountedFiles {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `secretObjects` entry of the SecretProviderClass is unusable
    #[error("Invalid secret object: {0}")]
    InvalidSecretObject(String),

    /// Secret data could not be assembled from the mounted files
    #[error("Failed to build secret data: {0}")]
    SecretData(String),

    /// Object from the API server is missing required metadata
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// One or more secrets of a reconcile pass failed
    #[error("Failed to sync {} secret(s): {}", .failures.len(), .failures.join("; "))]
    SyncFailed { failures: Vec<String> },

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ControllerError {
    /// Whether requeueing could make a difference.
    ///
    /// Invalid objects and configuration only change when a user edits them,
    /// which triggers a fresh reconcile anyway.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cluster(err) => err.is_retryable(),
            Self::InvalidConfig(_) | Self::InvalidSecretObject(_) | Self::InvalidObject(_) => false,
            _ => true,
        }
    }
}
