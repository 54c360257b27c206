//! Kubernetes Event recording
//!
//! Reconcile outcomes are reported as Events on the pod that mounted the
//! secrets so they show up in `kubectl describe pod`.
//!
//! Recording is **fire-and-forget**: `record()` never blocks the reconcile
//! pass and never returns an error. [`KubeEventRecorder`] queues events on a
//! channel drained by a single background task, so events from one caller
//! reach the API server in the order they were recorded.

use k8s_openapi::api::core::v1::ObjectReference;
use kube::Client;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Well-known event reason strings.
pub mod reasons {
    /// Secret created or owner reference added
    pub const SECRET_SYNCED: &str = "SecretSynced";
    /// Secret could not be created
    pub const FAILED_TO_CREATE_SECRET: &str = "FailedToCreateSecret";
    /// Owner reference could not be added to the secret
    pub const FAILED_TO_PATCH_SECRET: &str = "FailedToPatchSecret";
    /// Mounted files for the pod could not be read
    pub const FAILED_TO_READ_MOUNTED_FILES: &str = "FailedToReadMountedFiles";
    /// Looking up the secret failed with something other than not found
    pub const FAILED_TO_CHECK_SECRET: &str = "FailedToCheckSecret";
    /// A `secretObjects` entry is missing its name, type or data
    pub const INVALID_SECRET_OBJECT: &str = "InvalidSecretObject";
}

const ACTION: &str = "SyncSecret";

/// Sink for Kubernetes Events.
pub trait EventRecorder: Send + Sync {
    /// Record one event against `object`. Must not block or fail.
    fn record(&self, object: &ObjectReference, type_: EventType, reason: &str, message: &str);
}

struct QueuedEvent {
    object: ObjectReference,
    event: Event,
}

/// Production recorder publishing through `kube::runtime::events::Recorder`.
pub struct KubeEventRecorder {
    tx: mpsc::UnboundedSender<QueuedEvent>,
}

impl std::fmt::Debug for KubeEventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventRecorder").finish_non_exhaustive()
    }
}

impl KubeEventRecorder {
    /// Create a recorder and spawn its publishing task.
    ///
    /// `controller_name` is the Event's reporting component, `instance`
    /// identifies this replica (the node id). Must be called from within a
    /// Tokio runtime. The task exits once the recorder is dropped.
    pub fn new(client: Client, controller_name: &str, instance: &str) -> Self {
        let recorder = Recorder::new(
            client,
            Reporter {
                controller: controller_name.to_string(),
                instance: Some(instance.to_string()),
            },
        );
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedEvent>();
        tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                if let Err(e) = recorder.publish(&queued.event, &queued.object).await {
                    warn!(
                        reason = %queued.event.reason,
                        object = ?queued.object.name,
                        error = %e,
                        "Failed to publish Kubernetes event"
                    );
                }
            }
            debug!("Event recorder stopped");
        });
        Self { tx }
    }
}

impl EventRecorder for KubeEventRecorder {
    fn record(&self, object: &ObjectReference, type_: EventType, reason: &str, message: &str) {
        let queued = QueuedEvent {
            object: object.clone(),
            event: Event {
                type_,
                reason: reason.to_string(),
                note: Some(message.to_string()),
                action: ACTION.to_string(),
                secondary: None,
            },
        };
        if self.tx.send(queued).is_err() {
            warn!(reason, "Event recorder is closed, dropping event");
        }
    }
}

/// `Normal` or `Warning`, as shown by kubectl
#[cfg(test)]
fn type_name(type_: EventType) -> &'static str {
    match type_ {
        EventType::Normal => "Normal",
        EventType::Warning => "Warning",
    }
}

/// In-memory recorder for tests.
///
/// Keeps each event as `"<Type> <reason> <message>"`, in recording order.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct FakeEventRecorder {
    events: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl FakeEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl EventRecorder for FakeEventRecorder {
    fn record(&self, _object: &ObjectReference, type_: EventType, reason: &str, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {} {}", type_name(type_), reason, message));
    }
}
