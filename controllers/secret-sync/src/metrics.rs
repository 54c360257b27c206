//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `secret_sync_reconciliations_total` - Total number of reconcile passes
//! - `secret_sync_reconciliation_errors_total` - Reconcile passes that returned an error
//! - `secret_sync_reconciliation_duration_seconds` - Duration of reconcile passes
//! - `secret_sync_secrets_created_total` - Secrets created
//! - `secret_sync_owner_references_added_total` - Owner references added to secrets
//! - `secret_sync_conflict_retries_total` - Secret writes retried after a conflict

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

/// Controller metrics and the registry they are exported from
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub reconciliations_total: IntCounter,
    pub reconciliation_errors_total: IntCounter,
    pub reconciliation_duration: Histogram,
    pub secrets_created_total: IntCounter,
    pub owner_references_added_total: IntCounter,
    pub conflict_retries_total: IntCounter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("reconciliations_total", &self.reconciliations_total.get())
            .field("reconciliation_errors_total", &self.reconciliation_errors_total.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create all metrics and register them with a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let reconciliations_total = counter(
            "secret_sync_reconciliations_total",
            "Total number of reconcile passes",
        )?;
        let reconciliation_errors_total = counter(
            "secret_sync_reconciliation_errors_total",
            "Total number of reconcile passes that returned an error",
        )?;
        let secrets_created_total = counter(
            "secret_sync_secrets_created_total",
            "Total number of secrets created",
        )?;
        let owner_references_added_total = counter(
            "secret_sync_owner_references_added_total",
            "Total number of owner references added to secrets",
        )?;
        let conflict_retries_total = counter(
            "secret_sync_conflict_retries_total",
            "Total number of secret writes retried after a conflict",
        )?;

        let reconciliation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "secret_sync_reconciliation_duration_seconds",
                "Duration of reconcile passes in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(reconciliation_duration.clone()))?;

        Ok(Self {
            registry,
            reconciliations_total,
            reconciliation_errors_total,
            reconciliation_duration,
            secrets_created_total,
            owner_references_added_total,
            conflict_retries_total,
        })
    }
}
