//! Caller-supplied deadlines for remote calls
//!
//! A reconcile pass gets one `Deadline`; every call it makes runs through
//! [`Deadline::run`] so a slow API server aborts the in-flight call instead of
//! stalling the pass.

use crate::error::ClusterError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Absolute point in time after which remote calls are abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Budget this deadline was created with
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Runs `fut`, dropping it and failing with `DeadlineExceeded` on expiry.
    ///
    /// Works for any error type that can carry a [`ClusterError`], so local
    /// work (file reads) can share the budget of the remote calls.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<ClusterError>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::DeadlineExceeded(self.budget).into()),
        }
    }
}
