//! Secret Sync Controller
//!
//! Node-local controller for the secrets-store CSI driver. For every
//! SecretProviderClassPodStatus written on this node it:
//! - creates the Kubernetes Secrets declared in the SecretProviderClass
//!   `secretObjects`, from the files the driver mounted for the pod
//! - adds the pod status as an owner of each Secret so they are garbage
//!   collected together
//! - reports outcomes as Events on the pod

mod backoff;
mod config;
mod controller;
mod error;
mod events;
mod metrics;
mod mounted_files;
mod owner_refs;
mod reconciler;
mod retry;
mod secret_data;
mod server;
#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::controller::Context;
use crate::error::ControllerError;
use crate::events::KubeEventRecorder;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::server::{ServerState, start_server};
use cluster_client::ClusterClient;
use crds::SecretProviderClassPodStatus;
use kube::Api;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONTROLLER_NAME: &str = "secret-sync-controller";

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "secret_sync_controller=info,cluster_client=info".into()),
        )
        .init();

    // kube's rustls-tls needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting Secret Sync Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Node: {}", config.node_id);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Reconcile timeout: {:?}", config.reconcile_timeout);
    info!(
        "  Conflict retries: {} attempts, {:?} apart",
        config.retry.max_attempts, config.retry.delay
    );
    info!("  Owner reference merge key: {}", config.merge_key);

    let metrics = Arc::new(Metrics::new()?);
    let server_state = Arc::new(ServerState {
        is_ready: AtomicBool::new(false),
        metrics: Arc::clone(&metrics),
    });
    let port = config.metrics_port;
    let state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = ClusterClient::try_default().await?;
    let version = client.validate_connectivity().await.map_err(|e| {
        error!("Failed to reach the Kubernetes API server: {}", e);
        e
    })?;
    info!("Connected to Kubernetes API server {}", version);

    let events = KubeEventRecorder::new(client.kube_client(), CONTROLLER_NAME, &config.node_id);
    let api: Api<SecretProviderClassPodStatus> = match &config.namespace {
        Some(ns) => Api::namespaced(client.kube_client(), ns),
        None => Api::all(client.kube_client()),
    };
    let reconciler = Reconciler::new(
        Arc::new(client),
        Arc::new(events),
        Arc::clone(&metrics),
        &config,
    );
    let ctx = Arc::new(Context::new(reconciler, metrics, &config));

    server_state.is_ready.store(true, Ordering::Relaxed);
    controller::run(api, ctx, &config.node_id).await;

    Ok(())
}
