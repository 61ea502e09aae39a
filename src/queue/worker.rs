use super::message::{Completion, RunOutcome};
use crate::error::FailureClass;
use super::Provisioner;
use crate::model::StoreTask;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub(crate) type SharedReceiver = Arc<Mutex<mpsc::Receiver<StoreTask>>>;

/// Spawns `count` workers pulling admitted tasks from one shared channel.
pub(crate) fn spawn_pool(
    count: usize,
    tasks: SharedReceiver,
    completions: mpsc::Sender<Completion>,
    provisioner: Arc<dyn Provisioner>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            tokio::spawn(worker_loop(
                worker_id,
                tasks.clone(),
                completions.clone(),
                provisioner.clone(),
            ))
        })
        .collect()
}

async fn worker_loop(
    worker_id: usize,
    tasks: SharedReceiver,
    completions: mpsc::Sender<Completion>,
    provisioner: Arc<dyn Provisioner>,
) {
    debug!(worker_id, "Provisioning worker started");

    loop {
        let next = {
            let mut rx = tasks.lock().await;
            rx.recv().await
        };
        let Some(task) = next else { break };

        let store_id = task.store_id;
        info!(worker_id, store_id = %store_id, "Worker picked up store");

        // A panicking run must still release its slot.
        let run = {
            let provisioner = provisioner.clone();
            let store_id = store_id.clone();
            tokio::spawn(async move { provisioner.provision(&store_id).await })
        };

        let outcome = match run.await {
            Ok(Ok(report)) => RunOutcome::Succeeded {
                degraded: report.is_degraded(),
            },
            Ok(Err(e)) => {
                debug!(worker_id, store_id = %store_id, error = %e, "Provisioning run failed");
                RunOutcome::Failed(e.class())
            }
            Err(e) => {
                error!(worker_id, store_id = %store_id, error = %e, "Provisioning run aborted");
                RunOutcome::Failed(FailureClass::FatalToTask)
            }
        };

        if completions
            .send(Completion { store_id, outcome })
            .await
            .is_err()
        {
            break;
        }
    }

    debug!(worker_id, "Provisioning worker stopped");
}
