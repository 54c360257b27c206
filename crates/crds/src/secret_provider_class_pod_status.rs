//! SecretProviderClassPodStatus
//!
//! Written by the CSI driver on the node that mounted a pod's secrets-store
//! volume. Unlike most CRDs it carries no spec: everything the driver reports
//! lives under a top-level `status`, so the `kube::Resource` impl is written
//! by hand instead of derived.

use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Label the driver sets to the name of the node that performed the mount
pub const INTERNAL_NODE_LABEL: &str = "internal.secrets-store.csi.k8s.io/node-name";

/// Per-pod mount status reported by the CSI driver
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecretProviderClassPodStatus {
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Mount outcome reported by the driver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SecretProviderClassPodStatusStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretProviderClassPodStatusStatus {
    /// Pod that mounted the volume
    #[serde(default)]
    pub pod_name: String,

    /// SecretProviderClass used for the mount
    #[serde(default)]
    pub secret_provider_class_name: String,

    /// Whether the mount completed
    #[serde(default)]
    pub mounted: bool,

    /// Kubelet target path holding the mounted files
    #[serde(default)]
    pub target_path: String,

    /// Provider objects written to the target path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<SecretProviderClassObject>,
}

/// Provider object identity and the version that was mounted
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretProviderClassObject {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
}

impl Resource for SecretProviderClassPodStatus {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        "SecretProviderClassPodStatus".into()
    }

    fn group(_: &()) -> Cow<'_, str> {
        crate::GROUP.into()
    }

    fn version(_: &()) -> Cow<'_, str> {
        crate::VERSION.into()
    }

    fn plural(_: &()) -> Cow<'_, str> {
        "secretproviderclasspodstatuses".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl SecretProviderClassPodStatus {
    /// Node name recorded by the driver, if the label is present
    pub fn node_name(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(INTERNAL_NODE_LABEL))
            .map(String::as_str)
    }

    /// Whether this status was written by the given node.
    ///
    /// Label values are case-sensitive; this matches exactly like the
    /// watcher's label selector does.
    pub fn is_on_node(&self, node_id: &str) -> bool {
        self.node_name() == Some(node_id)
    }

    /// Owner reference pointing at this status object.
    ///
    /// Returns `None` until the object has been persisted (no name or UID).
    /// The controller and block-owner-deletion flags are left unset so the
    /// reference never competes with a Secret's controlling owner.
    pub fn owner_reference(&self) -> Option<OwnerReference> {
        Some(OwnerReference {
            api_version: Self::api_version(&()).into_owned(),
            kind: Self::kind(&()).into_owned(),
            name: self.metadata.name.clone()?,
            uid: self.metadata.uid.clone()?,
            controller: None,
            block_owner_deletion: None,
        })
    }
}
