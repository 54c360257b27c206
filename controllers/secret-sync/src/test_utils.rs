//! Test utilities for unit testing the reconciler
//!
//! Fixtures mirror what the CSI driver and API server hand the controller.

use crate::config::ControllerConfig;
use crate::events::FakeEventRecorder;
use crate::metrics::Metrics;
use crate::owner_refs::OwnerRefMergeKey;
use crate::reconciler::Reconciler;
use crate::retry::RetryPolicy;
use cluster_client::{Deadline, MockClusterClient};
use crds::{
    INTERNAL_NODE_LABEL, SecretObject, SecretObjectData, SecretProviderClass,
    SecretProviderClassPodStatus, SecretProviderClassPodStatusStatus, SecretProviderClassSpec,
};
use k8s_openapi::api::core::v1::{Pod, PodStatus, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const SPCPS_UID: &str = "72a0ecb8-c6e5-41e1-8da1-25e37ec61b26";

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Secret as it would come back from the API server
pub fn new_secret(name: &str, namespace: &str, labels: BTreeMap<String, String>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            resource_version: Some("73659".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Mounted pod status for `pod1` / `spc1` written by `node`
pub fn new_pod_status(name: &str, namespace: &str, node: &str, target_path: &str) -> SecretProviderClassPodStatus {
    SecretProviderClassPodStatus {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels(&[(INTERNAL_NODE_LABEL, node)])),
            uid: Some(SPCPS_UID.to_string()),
            resource_version: Some("73659".to_string()),
            ..Default::default()
        },
        status: Some(SecretProviderClassPodStatusStatus {
            pod_name: "pod1".to_string(),
            secret_provider_class_name: "spc1".to_string(),
            mounted: true,
            target_path: target_path.to_string(),
            objects: Vec::new(),
        }),
    }
}

pub fn new_pod(name: &str, namespace: &str, phase: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some("481ab824-1f07-4611-bc08-c41f5cbb5a8d".to_string()),
            ..Default::default()
        },
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn new_secret_object(secret_name: &str, type_: &str, data: &[(&str, &str)]) -> SecretObject {
    SecretObject {
        secret_name: secret_name.to_string(),
        type_: type_.to_string(),
        labels: labels(&[("environment", "test")]),
        data: data
            .iter()
            .map(|(object_name, key)| SecretObjectData {
                object_name: (*object_name).to_string(),
                key: (*key).to_string(),
            })
            .collect(),
    }
}

pub fn new_provider_class(name: &str, namespace: &str, secret_objects: Vec<SecretObject>) -> SecretProviderClass {
    let mut class = SecretProviderClass::new(
        name,
        SecretProviderClassSpec {
            provider: "mock".to_string(),
            secret_objects,
            ..Default::default()
        },
    );
    class.metadata.namespace = Some(namespace.to_string());
    class
}

/// Set `metadata.deletionTimestamp` on a serializable object
pub fn mark_deleted<T>(object: &T) -> T
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let mut value = serde_json::to_value(object).unwrap();
    value["metadata"]["deletionTimestamp"] = serde_json::json!("2024-01-01T00:00:00Z");
    serde_json::from_value(value).unwrap()
}

pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        node_id: "node1".to_string(),
        namespace: None,
        reconcile_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 5,
            delay: Duration::ZERO,
        },
        merge_key: OwnerRefMergeKey::default(),
        backoff_min_secs: 5,
        backoff_max_secs: 300,
        metrics_port: 8080,
    }
}

pub fn create_test_reconciler(client: &MockClusterClient) -> (Reconciler, FakeEventRecorder) {
    create_test_reconciler_with_config(client, &test_config())
}

pub fn create_test_reconciler_with_config(
    client: &MockClusterClient,
    config: &ControllerConfig,
) -> (Reconciler, FakeEventRecorder) {
    let events = FakeEventRecorder::new();
    let reconciler = Reconciler::new(
        Arc::new(client.clone()),
        Arc::new(events.clone()),
        Arc::new(Metrics::new().unwrap()),
        config,
    );
    (reconciler, events)
}

pub fn test_deadline() -> Deadline {
    Deadline::after(Duration::from_secs(5))
}
