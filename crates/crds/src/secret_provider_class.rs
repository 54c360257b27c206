//! SecretProviderClass CRD
//!
//! Declares the external provider (vault, KMS, ...) a pod mounts secrets from,
//! and optionally which mounted objects should be mirrored into Kubernetes
//! Secrets via `secretObjects`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "secrets-store.csi.x-k8s.io",
    version = "v1alpha1",
    kind = "SecretProviderClass",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SecretProviderClassSpec {
    /// Provider plugin name (e.g. "vault", "azure")
    #[serde(default)]
    pub provider: String,

    /// Provider-specific parameters, passed through to the provider verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,

    /// Kubernetes Secrets to keep in sync with the mounted content
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_objects: Vec<SecretObject>,
}

/// A Kubernetes Secret to create from mounted provider objects
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretObject {
    /// Name of the Kubernetes Secret
    #[serde(default)]
    pub secret_name: String,

    /// Kubernetes Secret type (e.g. "Opaque", "kubernetes.io/tls")
    #[serde(default, rename = "type")]
    pub type_: String,

    /// Labels applied to the Secret on creation
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Mapping of mounted objects to Secret data keys
    #[serde(default)]
    pub data: Vec<SecretObjectData>,
}

/// One Secret data entry sourced from a mounted object
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretObjectData {
    /// Name of the mounted object (file name under the target path)
    #[serde(default)]
    pub object_name: String,

    /// Data key in the Kubernetes Secret
    #[serde(default)]
    pub key: String,
}

impl SecretProviderClass {
    /// Secret objects declared by this class, empty when none are configured
    pub fn secret_objects(&self) -> &[SecretObject] {
        &self.spec.secret_objects
    }
}
