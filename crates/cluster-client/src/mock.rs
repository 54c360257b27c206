//! Mock ClusterClient for unit testing
//!
//! Stores objects in memory and mimics the API server behaviour the
//! controller relies on: `resourceVersion` bumps on every write, conditional
//! replace that fails with `Conflict` on a stale version, and `AlreadyExists`
//! on duplicate creates. Failures and concurrent writers can be injected per
//! operation.

use crate::error::ClusterError;
use crate::cluster_trait::ClusterClientTrait;
use crds::{SecretProviderClass, SecretProviderClassPodStatus};
use k8s_openapi::api::core::v1::{Pod, Secret};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Key = (String, String);

/// Operations that can have failures injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetSecret,
    CreateSecret,
    ReplaceSecret,
    GetPodStatus,
    GetProviderClass,
    GetPod,
}

type SecretMutation = Box<dyn FnOnce(&mut Secret) + Send>;

/// Mock ClusterClient for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    secrets: Arc<Mutex<BTreeMap<Key, Secret>>>,
    pod_statuses: Arc<Mutex<BTreeMap<Key, SecretProviderClassPodStatus>>>,
    provider_classes: Arc<Mutex<BTreeMap<Key, SecretProviderClass>>>,
    pods: Arc<Mutex<BTreeMap<Key, Pod>>>,
    failures: Arc<Mutex<HashMap<Operation, VecDeque<ClusterError>>>>,
    // Applied to the stored secret right before the next replace, simulating
    // another writer sneaking in between our read and our write.
    concurrent_writers: Arc<Mutex<VecDeque<SecretMutation>>>,
    calls: Arc<Mutex<Vec<Operation>>>,
    latency: Arc<Mutex<Option<Duration>>>,
    resource_version: Arc<AtomicU64>,
}

impl std::fmt::Debug for MockClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClusterClient")
            .field("secrets", &lock(&self.secrets).len())
            .field("calls", &lock(&self.calls).len())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn key(name: &str, namespace: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn object_key(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> Key {
    key(
        meta.name.as_deref().unwrap_or_default(),
        meta.namespace.as_deref().unwrap_or_default(),
    )
}

impl MockClusterClient {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    fn next_resource_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Add a secret to the mock store (for test setup).
    ///
    /// A `resourceVersion` is assigned if the fixture does not carry one.
    pub fn add_secret(&self, mut secret: Secret) {
        if secret.metadata.resource_version.is_none() {
            secret.metadata.resource_version = Some(self.next_resource_version());
        }
        lock(&self.secrets).insert(object_key(&secret.metadata), secret);
    }

    /// Add a pod status to the mock store (for test setup)
    pub fn add_pod_status(&self, status: SecretProviderClassPodStatus) {
        lock(&self.pod_statuses).insert(object_key(&status.metadata), status);
    }

    /// Add a provider class to the mock store (for test setup)
    pub fn add_provider_class(&self, class: SecretProviderClass) {
        lock(&self.provider_classes).insert(object_key(&class.metadata), class);
    }

    /// Add a pod to the mock store (for test setup)
    pub fn add_pod(&self, pod: Pod) {
        lock(&self.pods).insert(object_key(&pod.metadata), pod);
    }

    /// Read a stored secret without recording a call
    pub fn secret(&self, name: &str, namespace: &str) -> Option<Secret> {
        lock(&self.secrets).get(&key(name, namespace)).cloned()
    }

    /// Fail the next call of `op` with `err`. Calls queue up in order.
    pub fn fail_next(&self, op: Operation, err: ClusterError) {
        lock(&self.failures).entry(op).or_default().push_back(err);
    }

    /// Mutate the stored secret right before the next `replace_secret`,
    /// bumping its resourceVersion so the in-flight write conflicts.
    pub fn concurrent_write_before_replace(&self, mutation: impl FnOnce(&mut Secret) + Send + 'static) {
        lock(&self.concurrent_writers).push_back(Box::new(mutation));
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = Some(latency);
    }

    /// Operations issued so far, in order
    pub fn calls(&self) -> Vec<Operation> {
        lock(&self.calls).clone()
    }

    /// Number of times `op` was issued
    pub fn call_count(&self, op: Operation) -> usize {
        lock(&self.calls).iter().filter(|c| **c == op).count()
    }

    async fn enter(&self, op: Operation) -> Result<(), ClusterError> {
        lock(&self.calls).push(op);
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match lock(&self.failures).get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn not_found(kind: &str, name: &str, namespace: &str) -> ClusterError {
    ClusterError::NotFound(format!("{kind} \"{name}\" not found in namespace \"{namespace}\""))
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, ClusterError> {
        self.enter(Operation::GetSecret).await?;
        self.secret(name, namespace)
            .ok_or_else(|| not_found("secrets", name, namespace))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        self.enter(Operation::CreateSecret).await?;
        let k = object_key(&secret.metadata);
        let mut secrets = lock(&self.secrets);
        if secrets.contains_key(&k) {
            return Err(ClusterError::AlreadyExists(format!(
                "secrets \"{}\" already exists",
                k.1
            )));
        }
        let mut stored = secret.clone();
        stored.metadata.resource_version = Some(self.next_resource_version());
        stored.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        secrets.insert(k, stored.clone());
        Ok(stored)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        self.enter(Operation::ReplaceSecret).await?;
        let k = object_key(&secret.metadata);
        let writer = lock(&self.concurrent_writers).pop_front();
        let mut secrets = lock(&self.secrets);
        let Some(current) = secrets.get_mut(&k) else {
            return Err(not_found("secrets", &k.1, &k.0));
        };
        if let Some(mutate) = writer {
            mutate(current);
            current.metadata.resource_version = Some(self.next_resource_version());
        }
        if secret.metadata.resource_version != current.metadata.resource_version {
            return Err(ClusterError::Conflict(format!(
                "Operation cannot be fulfilled on secrets \"{}\": the object has been modified; please apply your changes to the latest version and try again",
                k.1
            )));
        }
        let mut stored = secret.clone();
        stored.metadata.resource_version = Some(self.next_resource_version());
        *current = stored.clone();
        Ok(stored)
    }

    async fn get_pod_status(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<SecretProviderClassPodStatus, ClusterError> {
        self.enter(Operation::GetPodStatus).await?;
        lock(&self.pod_statuses)
            .get(&key(name, namespace))
            .cloned()
            .ok_or_else(|| not_found("secretproviderclasspodstatuses", name, namespace))
    }

    async fn get_provider_class(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<SecretProviderClass, ClusterError> {
        self.enter(Operation::GetProviderClass).await?;
        lock(&self.provider_classes)
            .get(&key(name, namespace))
            .cloned()
            .ok_or_else(|| not_found("secretproviderclasses", name, namespace))
    }

    async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, ClusterError> {
        self.enter(Operation::GetPod).await?;
        lock(&self.pods)
            .get(&key(name, namespace))
            .cloned()
            .ok_or_else(|| not_found("pods", name, namespace))
    }
}
