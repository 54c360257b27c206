//! Secrets Store CSI driver resource types
//!
//! The CSI driver owns these resources; the secret-sync controller only
//! reads them. `SecretProviderClass` describes which provider objects should
//! be mirrored into Kubernetes Secrets, and `SecretProviderClassPodStatus`
//! records what the driver actually mounted for a given pod.

pub mod secret_provider_class;
pub mod secret_provider_class_pod_status;

pub use secret_provider_class::*;
pub use secret_provider_class_pod_status::*;

/// API group shared by all Secrets Store CSI driver resources
pub const GROUP: &str = "secrets-store.csi.x-k8s.io";

/// API version of the resources in this crate
pub const VERSION: &str = "v1alpha1";
