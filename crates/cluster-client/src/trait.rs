//! ClusterClient trait for mocking
//!
//! This trait abstracts the Kubernetes object store so reconcilers can be
//! unit tested against an in-memory implementation.

use crate::error::ClusterError;
use crds::{SecretProviderClass, SecretProviderClassPodStatus};
use k8s_openapi::api::core::v1::{Pod, Secret};

/// Object store operations used by the secret-sync controller
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    /// Get a Secret by name and namespace
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, ClusterError>;

    /// Create a Secret; the namespace is taken from its metadata
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError>;

    /// Conditionally replace a Secret.
    ///
    /// The write only succeeds if `metadata.resourceVersion` still matches the
    /// stored object; otherwise `ClusterError::Conflict` is returned.
    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError>;

    /// Get a SecretProviderClassPodStatus by name and namespace
    async fn get_pod_status(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<SecretProviderClassPodStatus, ClusterError>;

    /// Get a SecretProviderClass by name and namespace
    async fn get_provider_class(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<SecretProviderClass, ClusterError>;

    /// Get a Pod by name and namespace
    async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, ClusterError>;
}
