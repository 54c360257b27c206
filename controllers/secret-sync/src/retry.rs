//! Bounded retry on optimistic-concurrency conflicts
//!
//! Only `Conflict` is retried here. Everything else, including transient
//! failures, goes back to the caller so the reconcile pass can fail and be
//! requeued with backoff.

use cluster_client::ClusterError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times to attempt a conflicting write and how long to wait between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; values below 1 behave as 1
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(10),
        }
    }
}

/// Run `op` until it succeeds, fails with something other than a conflict,
/// or the policy's attempts are used up.
///
/// `op` is re-invoked from scratch on every attempt so it can re-read the
/// object and recompute its change. On exhaustion the last `Conflict` is
/// returned, which callers treat as retryable.
pub async fn retry_on_conflict<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ClusterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClusterError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_conflict() && attempt < max_attempts => {
                debug!(attempt, max_attempts, "Conflict, retrying: {}", err);
                attempt += 1;
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            result => return result,
        }
    }
}
