//! Kubernetes object store client
//!
//! A narrow client over the handful of Kubernetes objects the secret-sync
//! controller touches: Secrets (read, create, conditional replace), the CSI
//! driver's `SecretProviderClassPodStatus` and `SecretProviderClass`, and Pods.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClient, ClusterClientTrait, Deadline};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClusterClient::try_default().await?;
//! let deadline = Deadline::after(Duration::from_secs(10));
//!
//! let secret = deadline.run(client.get_secret("my-secret", "default")).await?;
//! println!("resourceVersion: {:?}", secret.metadata.resource_version);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Error classification**: API responses map onto [`ClusterError`] kinds
//!   (not found, conflict, transient, ...)
//! - **Deadlines**: [`Deadline`] bounds any call with a caller-supplied budget
//! - **Mocking**: `MockClusterClient` behind the `test-util` feature

pub mod client;
pub mod deadline;
pub mod error;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::ClusterClient;
pub use cluster_trait::ClusterClientTrait;
pub use deadline::Deadline;
pub use error::ClusterError;
#[cfg(feature = "test-util")]
pub use mock::{MockClusterClient, Operation};
