//! Controller wiring.
//!
//! Runs `kube_runtime::Controller` over the SecretProviderClassPodStatus
//! objects of this node. The runtime guarantees a given object is never
//! reconciled twice at the same time; failed passes are requeued with a
//! per-object Fibonacci backoff that resets on the next success.

use crate::backoff::FibonacciBackoff;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crds::{INTERNAL_NODE_LABEL, SecretProviderClassPodStatus};
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::{Controller, watcher};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Maximum reconcile passes in flight at once
const CONCURRENCY: u16 = 10;

struct BackoffState {
    backoff: FibonacciBackoff,
    last_failure: Instant,
}

/// Shared state handed to every reconcile and error policy call
pub struct Context {
    pub reconciler: Reconciler,
    pub metrics: Arc<Metrics>,
    /// Backoff per object (namespace/name)
    backoff_states: Mutex<HashMap<String, BackoffState>>,
    backoff_min_secs: u64,
    backoff_max_secs: u64,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(reconciler: Reconciler, metrics: Arc<Metrics>, config: &ControllerConfig) -> Self {
        Self {
            reconciler,
            metrics,
            backoff_states: Mutex::new(HashMap::new()),
            backoff_min_secs: config.backoff_min_secs,
            backoff_max_secs: config.backoff_max_secs,
        }
    }

    fn next_backoff(&self, key: &str) -> Duration {
        let now = Instant::now();
        // A failing object is requeued at least every max backoff, so an
        // entry idle for twice that belongs to an object that was deleted.
        let stale_after = Duration::from_secs(self.backoff_max_secs.max(self.backoff_min_secs)) * 2;
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        states.retain(|_, state| now.duration_since(state.last_failure) <= stale_after);
        let state = states.entry(key.to_string()).or_insert_with(|| BackoffState {
            backoff: FibonacciBackoff::new(self.backoff_min_secs, self.backoff_max_secs),
            last_failure: now,
        });
        state.last_failure = now;
        state.backoff.next_backoff()
    }

    #[cfg(test)]
    fn tracked_backoffs(&self) -> usize {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn reset_backoff(&self, key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

fn object_key(obj: &SecretProviderClassPodStatus) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Reconcile entry point for the runtime
pub async fn reconcile(
    obj: Arc<SecretProviderClassPodStatus>,
    ctx: Arc<Context>,
) -> Result<Action, ControllerError> {
    let name = obj.name_any();
    let namespace = obj.namespace().ok_or_else(|| {
        ControllerError::InvalidObject(format!("SecretProviderClassPodStatus {name} has no namespace"))
    })?;
    debug!("Reconciling SecretProviderClassPodStatus {}/{}", namespace, name);

    ctx.metrics.reconciliations_total.inc();
    let timer = ctx.metrics.reconciliation_duration.start_timer();
    let result = ctx.reconciler.reconcile(&name, &namespace).await;
    timer.observe_duration();

    if result.is_ok() {
        ctx.reset_backoff(&object_key(&obj));
    }
    result
}

/// Requeue failed passes with per-object Fibonacci backoff
pub fn error_policy(
    obj: Arc<SecretProviderClassPodStatus>,
    error: &ControllerError,
    ctx: Arc<Context>,
) -> Action {
    ctx.metrics.reconciliation_errors_total.inc();
    let key = object_key(&obj);
    let delay = ctx.next_backoff(&key);
    if error.is_retryable() {
        warn!("Reconciliation of {} failed, retrying in {:?}: {}", key, delay, error);
    } else {
        error!("Reconciliation of {} failed, retrying in {:?}: {}", key, delay, error);
    }
    Action::requeue(delay)
}

/// Only pod statuses the driver on this node wrote
pub fn watcher_config(node_id: &str) -> watcher::Config {
    watcher::Config::default().labels(&format!("{INTERNAL_NODE_LABEL}={node_id}"))
}

/// Run the controller until a shutdown signal is received
pub async fn run(api: Api<SecretProviderClassPodStatus>, ctx: Arc<Context>, node_id: &str) {
    info!("Starting SecretProviderClassPodStatus controller for node {}", node_id);

    Controller::new(api, watcher_config(node_id))
        .with_config(RuntimeConfig::default().concurrency(CONCURRENCY))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled {}/{}", obj.namespace.as_deref().unwrap_or_default(), obj.name),
                Err(e) => debug!("Controller error: {}", e),
            }
        })
        .await;

    info!("Controller stopped");
}
