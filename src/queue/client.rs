use super::error::QueueError;
use super::message::QueueRequest;
use crate::model::{EnqueueReceipt, QueueStats, StoreTask};
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

/// Handle to the admission queue. Cheap to clone; the queue shuts down once every
/// clone is dropped.
#[derive(Clone)]
pub struct QueueClient {
    sender: mpsc::Sender<QueueRequest>,
}

impl QueueClient {
    pub(crate) fn new(sender: mpsc::Sender<QueueRequest>) -> Self {
        Self { sender }
    }

    /// Queues `store_id` for provisioning. Returns as soon as the task is queued.
    #[instrument(skip(self, store_id), fields(store_id = tracing::field::Empty))]
    pub async fn enqueue(&self, store_id: impl Into<String>) -> Result<EnqueueReceipt, QueueError> {
        let task = StoreTask::new(store_id);
        tracing::Span::current().record("store_id", task.store_id.as_str());

        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(QueueRequest::Enqueue { task, respond_to })
            .await
            .map_err(|_| QueueError::Closed)?;
        response.await.map_err(|_| QueueError::Dropped)
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(QueueRequest::Stats { respond_to })
            .await
            .map_err(|_| QueueError::Closed)?;
        response.await.map_err(|_| QueueError::Dropped)
    }
}
