//! Per-secret operations: existence check, create-or-skip, ownership patch
//! and event emission.
//!
//! Each operation is idempotent on its own; the full pass in the parent
//! module composes them without any atomicity across steps.

use super::Reconciler;
use crate::owner_refs::merge_owner_reference;
use crate::retry::retry_on_conflict;
use cluster_client::{ClusterError, Deadline};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::runtime::events::EventType;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Name and namespace of a Secret
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretIdentity {
    pub name: String,
    pub namespace: String,
}

impl SecretIdentity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for SecretIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Result of [`Reconciler::create_or_skip`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Secret was created by this call
    Created,
    /// Caller reported the secret as existing; nothing was written
    Skipped,
    /// Create raced with another writer and lost; the secret exists
    AlreadyPresent,
}

/// Result of [`Reconciler::patch_owner_reference`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Owner reference was added
    Patched,
    /// An equivalent owner reference was already present
    Unchanged,
    /// Secret does not exist (anymore); nothing to patch
    SecretMissing,
}

impl Reconciler {
    /// Look the secret up. `None` means absent; only `NotFound` maps to it,
    /// any other failure is returned as an error.
    ///
    /// The returned object seeds the first ownership patch attempt so an
    /// uncontended pass reads each secret once.
    pub async fn secret_exists(
        &self,
        identity: &SecretIdentity,
        deadline: &Deadline,
    ) -> Result<Option<Secret>, ClusterError> {
        match deadline
            .run(self.client.get_secret(&identity.name, &identity.namespace))
            .await
        {
            Ok(secret) => Ok(Some(secret)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create the secret unless `exists` says it is already there.
    ///
    /// Losing a create race (`AlreadyExists`) counts as success. The secret
    /// is written exactly as given: labels are not augmented here.
    pub async fn create_or_skip(
        &self,
        identity: &SecretIdentity,
        data: BTreeMap<String, ByteString>,
        labels: BTreeMap<String, String>,
        type_: &str,
        exists: bool,
        deadline: &Deadline,
    ) -> Result<CreateOutcome, ClusterError> {
        if exists {
            debug!(secret = %identity, "Secret exists, skipping create");
            return Ok(CreateOutcome::Skipped);
        }

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(identity.name.clone()),
                namespace: Some(identity.namespace.clone()),
                labels: (!labels.is_empty()).then_some(labels),
                ..Default::default()
            },
            data: Some(data),
            type_: (!type_.is_empty()).then(|| type_.to_string()),
            ..Default::default()
        };

        match deadline.run(self.client.create_secret(&secret)).await {
            Ok(_) => {
                info!(secret = %identity, "Created secret");
                self.metrics.secrets_created_total.inc();
                Ok(CreateOutcome::Created)
            }
            Err(e) if e.is_already_exists() => {
                debug!(secret = %identity, "Secret created concurrently");
                Ok(CreateOutcome::AlreadyPresent)
            }
            Err(e) => Err(e),
        }
    }

    /// Add `owner` to the secret's owner references.
    ///
    /// Merges by the configured key and writes only when the list changed,
    /// conditional on the read `resourceVersion`. The first attempt works on
    /// `current` when given, otherwise reads the secret. A conflicting write
    /// re-reads and re-merges, up to the retry policy.
    pub async fn patch_owner_reference(
        &self,
        identity: &SecretIdentity,
        owner: &OwnerReference,
        current: Option<Secret>,
        deadline: &Deadline,
    ) -> Result<PatchOutcome, ClusterError> {
        let mut current = current;
        let mut attempts: u64 = 0;
        let result = retry_on_conflict(&self.retry, || {
            attempts += 1;
            self.try_add_owner(identity, owner, current.take(), deadline)
        })
        .await;
        self.metrics.conflict_retries_total.inc_by(attempts.saturating_sub(1));

        match result {
            Ok(PatchOutcome::Patched) => {
                info!(secret = %identity, owner = %owner.name, "Added owner reference");
                self.metrics.owner_references_added_total.inc();
            }
            Ok(PatchOutcome::SecretMissing) => {
                warn!(secret = %identity, "Secret not found, owner reference not added");
            }
            Ok(PatchOutcome::Unchanged) => {
                debug!(secret = %identity, "Owner reference already present");
            }
            Err(_) => {}
        }
        result
    }

    async fn try_add_owner(
        &self,
        identity: &SecretIdentity,
        owner: &OwnerReference,
        current: Option<Secret>,
        deadline: &Deadline,
    ) -> Result<PatchOutcome, ClusterError> {
        let mut secret = match current {
            Some(secret) => secret,
            None => match self.secret_exists(identity, deadline).await? {
                Some(secret) => secret,
                None => return Ok(PatchOutcome::SecretMissing),
            },
        };

        let existing = secret.metadata.owner_references.as_deref().unwrap_or_default();
        let Some(merged) = merge_owner_reference(existing, owner, self.merge_key) else {
            return Ok(PatchOutcome::Unchanged);
        };
        secret.metadata.owner_references = Some(merged);

        match deadline.run(self.client.replace_secret(&secret)).await {
            Ok(_) => Ok(PatchOutcome::Patched),
            Err(e) if e.is_not_found() => Ok(PatchOutcome::SecretMissing),
            Err(e) => Err(e),
        }
    }

    /// Record an event against `object`. Never blocks or fails.
    pub fn generate_event(
        &self,
        object: &ObjectReference,
        type_: EventType,
        reason: &str,
        message: &str,
    ) {
        self.events.record(object, type_, reason, message);
    }
}
