use crate::cluster::CommandError;
use crate::error::FailureClass;
use crate::model::{EnqueueReceipt, QueueStats, StoreTask};
use tokio::sync::oneshot;

/// One-shot channel the dispatcher answers on.
pub type Response<T> = oneshot::Sender<T>;

/// Requests accepted by the dispatcher.
#[derive(Debug)]
pub enum QueueRequest {
    Enqueue {
        task: StoreTask,
        respond_to: Response<EnqueueReceipt>,
    },
    Stats {
        respond_to: Response<QueueStats>,
    },
}

/// Sent by a worker when a provisioning run ends, however it ended.
#[derive(Debug)]
pub(crate) struct Completion {
    pub store_id: String,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    Succeeded { degraded: bool },
    /// A panicking run counts as fatal.
    Failed(FailureClass),
}

/// Result of the release lookup made before admitting `task`.
#[derive(Debug)]
pub(crate) struct AdmissionCheck {
    pub task: StoreTask,
    pub live: Result<Vec<String>, CommandError>,
}
