//! Controller configuration
//!
//! Read once at startup from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `NODE_ID` | required |
//! | `WATCH_NAMESPACE` | all namespaces |
//! | `RECONCILE_TIMEOUT_SECS` | 30 |
//! | `CONFLICT_RETRY_ATTEMPTS` | 5 |
//! | `CONFLICT_RETRY_DELAY_MS` | 10 |
//! | `OWNER_REF_MERGE_KEY` | `apiVersionKindName` |
//! | `BACKOFF_MIN_SECS` | 5 |
//! | `BACKOFF_MAX_SECS` | 300 |
//! | `METRICS_PORT` | 8080 |

use crate::error::ControllerError;
use crate::owner_refs::OwnerRefMergeKey;
use crate::retry::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Node this replica runs on; only pod statuses written by this node are reconciled
    pub node_id: String,
    /// Namespace to watch, `None` for all namespaces
    pub namespace: Option<String>,
    /// Budget for one reconcile pass
    pub reconcile_timeout: Duration,
    pub retry: RetryPolicy,
    pub merge_key: OwnerRefMergeKey,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    pub metrics_port: u16,
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let node_id = non_empty(&lookup, "NODE_ID").ok_or_else(|| {
            ControllerError::InvalidConfig("NODE_ID environment variable is required".to_string())
        })?;

        let backoff_min_secs = setting(&lookup, "BACKOFF_MIN_SECS", 5u64)?;
        let backoff_max_secs = setting(&lookup, "BACKOFF_MAX_SECS", 300u64)?;
        if backoff_min_secs == 0 || backoff_max_secs < backoff_min_secs {
            return Err(ControllerError::InvalidConfig(format!(
                "backoff range {backoff_min_secs}s..{backoff_max_secs}s is invalid"
            )));
        }

        let reconcile_timeout_secs = setting(&lookup, "RECONCILE_TIMEOUT_SECS", 30u64)?;
        if reconcile_timeout_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let defaults = RetryPolicy::default();
        Ok(Self {
            node_id,
            namespace: non_empty(&lookup, "WATCH_NAMESPACE"),
            reconcile_timeout: Duration::from_secs(reconcile_timeout_secs),
            retry: RetryPolicy {
                max_attempts: setting(&lookup, "CONFLICT_RETRY_ATTEMPTS", defaults.max_attempts)?,
                delay: Duration::from_millis(setting(&lookup, "CONFLICT_RETRY_DELAY_MS", 10u64)?),
            },
            merge_key: setting(&lookup, "OWNER_REF_MERGE_KEY", OwnerRefMergeKey::default())?,
            backoff_min_secs,
            backoff_max_secs,
            metrics_port: setting(&lookup, "METRICS_PORT", 8080u16)?,
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn setting<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{key}='{raw}': {e}"))),
    }
}
