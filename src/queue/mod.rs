//! # Admission Queue
//!
//! FIFO admission of store tasks with a concurrency cap and a global store quota.
//!
//! The queue follows the actor pattern: [`AdmissionQueue`] owns every piece of queue
//! state inside a single task and is reached through cloneable [`QueueClient`]
//! handles. Admitted tasks go to a fixed pool of workers over a channel; a worker
//! reports each finished run on a completion channel, which frees its slot and lets
//! the dispatcher admit the next task.
//!
//! ```ignore
//! let (queue, client) = AdmissionQueue::new(AdmissionLimits::default(), 32);
//! tokio::spawn(queue.run(QueueContext { provisioner, inventory, events }));
//!
//! let receipt = client.enqueue("my-shop").await?;
//! ```
//!
//! Dependencies ([`Provisioner`], [`ReleaseInventory`]) are injected at `run` time
//! so that tests can substitute fakes.

mod admission;
mod client;
mod error;
mod message;
mod worker;

pub use admission::{AdmissionQueue, QueueContext};
pub use client::QueueClient;
pub use error::QueueError;
pub use message::QueueRequest;

use crate::cluster::{CommandError, Helm};
use crate::error::{ProvisionError, ProvisionReport};
use async_trait::async_trait;

/// Runs the provisioning lifecycle for one store.
#[async_trait]
pub trait Provisioner: Send + Sync + 'static {
    async fn provision(&self, store_id: &str) -> Result<ProvisionReport, ProvisionError>;
}

/// Names the stores that exist in the cluster.
#[async_trait]
pub trait ReleaseInventory: Send + Sync + 'static {
    async fn live_releases(&self) -> Result<Vec<String>, CommandError>;
}

#[async_trait]
impl ReleaseInventory for Helm {
    async fn live_releases(&self) -> Result<Vec<String>, CommandError> {
        Ok(self.list().await?.into_iter().map(|r| r.name).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionLimits {
    /// Provisioning runs allowed in flight at once.
    pub max_concurrent: usize,
    /// Stores (live releases plus admitted runs) at or above which new tasks are
    /// rejected.
    pub max_stores_total: usize,
    /// Accept a store id that is already pending or in flight.
    pub allow_duplicates: bool,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_stores_total: 5,
            allow_duplicates: false,
        }
    }
}
