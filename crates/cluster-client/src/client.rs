//! Kubernetes API client
//!
//! Implements [`ClusterClientTrait`] on top of `kube::Api`. Every failure is
//! classified into a [`ClusterError`] before it leaves this module.

use crate::error::ClusterError;
use crate::cluster_trait::ClusterClientTrait;
use crds::{SecretProviderClass, SecretProviderClassPodStatus};
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::debug;

/// Object store client backed by the Kubernetes API server
#[derive(Clone)]
pub struct ClusterClient {
    client: Client,
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient").finish_non_exhaustive()
    }
}

impl ClusterClient {
    /// Wrap an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a client from the in-cluster or kubeconfig environment
    pub async fn try_default() -> Result<Self, ClusterError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Transient(format!("failed to infer kube config: {e}")))?;
        Ok(Self::new(client))
    }

    /// Underlying kube client, for watchers and event recorders
    pub fn kube_client(&self) -> Client {
        self.client.clone()
    }

    /// Check connectivity by asking the API server for its version
    pub async fn validate_connectivity(&self) -> Result<String, ClusterError> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn require_namespace(secret: &Secret) -> Result<&str, ClusterError> {
    secret
        .metadata
        .namespace
        .as_deref()
        .ok_or_else(|| ClusterError::Invalid("Secret is missing metadata.namespace".to_string()))
}

fn require_name(secret: &Secret) -> Result<&str, ClusterError> {
    secret
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| ClusterError::Invalid("Secret is missing metadata.name".to_string()))
}

#[async_trait::async_trait]
impl ClusterClientTrait for ClusterClient {
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, ClusterError> {
        debug!("GET secret {}/{}", namespace, name);
        Ok(self.secrets(namespace).get(name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let namespace = require_namespace(secret)?;
        debug!("CREATE secret {}/{}", namespace, require_name(secret)?);
        Ok(self
            .secrets(namespace)
            .create(&PostParams::default(), secret)
            .await?)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let namespace = require_namespace(secret)?;
        let name = require_name(secret)?;
        // Without a resourceVersion the API server would accept the write
        // unconditionally and silently drop concurrent owner changes.
        if secret.metadata.resource_version.is_none() {
            return Err(ClusterError::Invalid(format!(
                "refusing unconditional update of secret {namespace}/{name}: no resourceVersion"
            )));
        }
        debug!("REPLACE secret {}/{}", namespace, name);
        Ok(self
            .secrets(namespace)
            .replace(name, &PostParams::default(), secret)
            .await?)
    }

    async fn get_pod_status(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<SecretProviderClassPodStatus, ClusterError> {
        debug!("GET secretproviderclasspodstatus {}/{}", namespace, name);
        let api: Api<SecretProviderClassPodStatus> =
            Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn get_provider_class(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<SecretProviderClass, ClusterError> {
        debug!("GET secretproviderclass {}/{}", namespace, name);
        let api: Api<SecretProviderClass> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, ClusterError> {
        debug!("GET pod {}/{}", namespace, name);
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }
}
