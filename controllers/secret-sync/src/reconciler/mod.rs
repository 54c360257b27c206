//! Reconciliation of SecretProviderClassPodStatus objects.
//!
//! One pass resolves the pod status, its pod and SecretProviderClass, then
//! for every `secretObjects` entry makes sure the Secret exists and is owned
//! by the pod status (so it is garbage collected with it). Outcomes are
//! reported as Events on the pod.

mod secret;
#[cfg(test)]
mod secret_test;

pub use secret::{CreateOutcome, PatchOutcome, SecretIdentity};

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::{EventRecorder, reasons};
use crate::metrics::Metrics;
use crate::mounted_files::read_mounted_files;
use crate::owner_refs::OwnerRefMergeKey;
use crate::retry::RetryPolicy;
use crate::secret_data::{build_secret_data, secret_labels, validate};
use cluster_client::{ClusterClientTrait, Deadline};
use crds::SecretObject;
use k8s_openapi::api::core::v1::{ObjectReference, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use kube::runtime::events::EventType;
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Requeue delay while the driver has not finished mounting
const NOT_MOUNTED_REQUEUE: Duration = Duration::from_secs(5);

/// Reconciles SecretProviderClassPodStatus objects into Secrets.
pub struct Reconciler {
    pub(crate) client: Arc<dyn ClusterClientTrait>,
    pub(crate) events: Arc<dyn EventRecorder>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) node_id: String,
    pub(crate) retry: RetryPolicy,
    pub(crate) merge_key: OwnerRefMergeKey,
    pub(crate) reconcile_timeout: Duration,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("node_id", &self.node_id)
            .field("retry", &self.retry)
            .field("merge_key", &self.merge_key)
            .field("reconcile_timeout", &self.reconcile_timeout)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn ClusterClientTrait>,
        events: Arc<dyn EventRecorder>,
        metrics: Arc<Metrics>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            client,
            events,
            metrics,
            node_id: config.node_id.clone(),
            retry: config.retry,
            merge_key: config.merge_key,
            reconcile_timeout: config.reconcile_timeout,
        }
    }

    /// Run one full pass for the pod status `namespace/name`.
    ///
    /// Returns the follow-up action on success. Any secret that failed to
    /// sync makes the pass return `SyncFailed` after the remaining secrets
    /// have been attempted.
    pub async fn reconcile(&self, name: &str, namespace: &str) -> Result<Action, ControllerError> {
        let deadline = Deadline::after(self.reconcile_timeout);

        let pod_status = match deadline.run(self.client.get_pod_status(name, namespace)).await {
            Ok(pod_status) => pod_status,
            Err(e) if e.is_not_found() => {
                debug!("SecretProviderClassPodStatus {}/{} not found", namespace, name);
                return Ok(Action::await_change());
            }
            Err(e) => return Err(e.into()),
        };

        if pod_status.metadata.deletion_timestamp.is_some() {
            debug!("SecretProviderClassPodStatus {}/{} is being deleted", namespace, name);
            return Ok(Action::await_change());
        }
        if !pod_status.is_on_node(&self.node_id) {
            debug!(
                "SecretProviderClassPodStatus {}/{} belongs to node {:?}, not {}",
                namespace,
                name,
                pod_status.node_name(),
                self.node_id
            );
            return Ok(Action::await_change());
        }
        let Some(status) = pod_status.status.as_ref().filter(|s| s.mounted) else {
            info!("SecretProviderClassPodStatus {}/{} not mounted yet, requeueing", namespace, name);
            return Ok(Action::requeue(NOT_MOUNTED_REQUEUE));
        };

        let pod = match deadline.run(self.client.get_pod(&status.pod_name, namespace)).await {
            Ok(pod) => pod,
            Err(e) if e.is_not_found() => {
                debug!("Pod {}/{} not found", namespace, status.pod_name);
                return Ok(Action::await_change());
            }
            Err(e) => return Err(e.into()),
        };
        if pod_is_terminated(&pod) {
            debug!("Pod {}/{} is terminated", namespace, status.pod_name);
            return Ok(Action::await_change());
        }
        let pod_ref = pod.object_ref(&());

        let provider_class = deadline
            .run(self.client.get_provider_class(&status.secret_provider_class_name, namespace))
            .await?;
        let secret_objects = provider_class.secret_objects();
        if secret_objects.is_empty() {
            debug!(
                "SecretProviderClass {}/{} has no secretObjects",
                namespace, status.secret_provider_class_name
            );
            return Ok(Action::await_change());
        }

        let owner = pod_status.owner_reference().ok_or_else(|| {
            ControllerError::InvalidObject(format!(
                "SecretProviderClassPodStatus {namespace}/{name} has no uid"
            ))
        })?;

        let files = match deadline.run(read_mounted_files(Path::new(&status.target_path))).await {
            Ok(files) => files,
            Err(e) => {
                self.generate_event(
                    &pod_ref,
                    EventType::Warning,
                    reasons::FAILED_TO_READ_MOUNTED_FILES,
                    &format!("failed to get mounted files: {e}"),
                );
                return Err(e);
            }
        };

        let mut failures = Vec::new();
        for object in secret_objects {
            if let Err(e) = self
                .sync_secret(object, namespace, &owner, &files, &pod_ref, &deadline)
                .await
            {
                warn!(
                    "Failed to sync secret {}/{} for {}/{}: {}",
                    namespace, object.secret_name, namespace, name, e
                );
                failures.push(format!("{namespace}/{}: {e}", object.secret_name));
            }
        }

        if failures.is_empty() {
            Ok(Action::await_change())
        } else {
            Err(ControllerError::SyncFailed { failures })
        }
    }

    async fn sync_secret(
        &self,
        object: &SecretObject,
        namespace: &str,
        owner: &OwnerReference,
        files: &BTreeMap<String, PathBuf>,
        pod_ref: &ObjectReference,
        deadline: &Deadline,
    ) -> Result<(), ControllerError> {
        if let Err(e) = validate(object) {
            self.generate_event(
                pod_ref,
                EventType::Warning,
                reasons::INVALID_SECRET_OBJECT,
                &format!("invalid secretObject in SecretProviderClass: {e}"),
            );
            return Err(e);
        }
        let identity = SecretIdentity::new(&object.secret_name, namespace);

        let existing = match self.secret_exists(&identity, deadline).await {
            Ok(existing) => existing,
            Err(e) => {
                self.generate_event(
                    pod_ref,
                    EventType::Warning,
                    reasons::FAILED_TO_CHECK_SECRET,
                    &format!("failed to check Kubernetes secret {identity}: {e}"),
                );
                return Err(e.into());
            }
        };

        let mut created = false;
        if existing.is_none() {
            let outcome = async {
                let data = deadline.run(build_secret_data(object, files)).await?;
                let outcome = self
                    .create_or_skip(&identity, data, secret_labels(object), &object.type_, existing.is_some(), deadline)
                    .await?;
                Ok::<_, ControllerError>(outcome)
            }
            .await;
            match outcome {
                Ok(outcome) => created = outcome == CreateOutcome::Created,
                Err(e) => {
                    self.generate_event(
                        pod_ref,
                        EventType::Warning,
                        reasons::FAILED_TO_CREATE_SECRET,
                        &format!("failed to create Kubernetes secret {identity}: {e}"),
                    );
                    return Err(e);
                }
            }
        }

        // A fresh create (or a lost create race) is re-read before patching
        let synced = match self.patch_owner_reference(&identity, owner, existing, deadline).await {
            Ok(PatchOutcome::Patched) => true,
            Ok(PatchOutcome::Unchanged) => created,
            Ok(PatchOutcome::SecretMissing) => false,
            Err(e) => {
                self.generate_event(
                    pod_ref,
                    EventType::Warning,
                    reasons::FAILED_TO_PATCH_SECRET,
                    &format!("failed to patch secret {identity} with owner reference: {e}"),
                );
                return Err(e.into());
            }
        };

        if synced {
            self.generate_event(
                pod_ref,
                EventType::Normal,
                reasons::SECRET_SYNCED,
                &format!("secret {identity} synced"),
            );
        }
        Ok(())
    }
}

/// Pod is going away or has finished running; its secrets no longer matter
fn pod_is_terminated(pod: &Pod) -> bool {
    pod.metadata.deletion_timestamp.is_some()
        || pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .is_some_and(|phase| phase == "Succeeded" || phase == "Failed")
}
