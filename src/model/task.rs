use serde::{Deserialize, Serialize};

/// A request to provision one store.
///
/// The store id doubles as the namespace and the Helm release name, so it must
/// already be in normalized form (see [`normalize_store_id`](crate::service::normalize_store_id)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTask {
    pub store_id: String,
}

impl StoreTask {
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
        }
    }
}

/// How the queue answered an enqueue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueStatus {
    /// The task was appended to the queue.
    Queued,
    /// The same store id is already queued or being provisioned.
    AlreadyPending,
}

/// Immediate acknowledgment returned by [`QueueClient::enqueue`](crate::queue::QueueClient::enqueue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    pub status: EnqueueStatus,
    pub store_id: String,
}

/// Point-in-time counters of the admission queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    /// Tasks waiting for admission.
    pub pending: usize,
    /// Tasks currently held by a worker.
    pub active: usize,
    /// Highest value `active` has reached.
    pub peak_active: usize,
    pub admitted: u64,
    pub rejected: u64,
    pub succeeded: u64,
    /// Succeeded runs that hit a non-fatal failure (also counted in `succeeded`).
    pub degraded: u64,
    pub failed: u64,
}

impl QueueStats {
    /// Number of admitted tasks that have finished, whatever the outcome.
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed
    }
}
