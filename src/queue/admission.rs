use super::client::QueueClient;
use super::message::{AdmissionCheck, Completion, QueueRequest, RunOutcome};
use super::worker::spawn_pool;
use super::{AdmissionLimits, Provisioner, ReleaseInventory};
use crate::error::ProvisionError;
use crate::events::EventLog;
use crate::model::{EnqueueReceipt, EnqueueStatus, QueueStats, StoreTask};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Dependencies injected when the dispatcher starts.
pub struct QueueContext {
    pub provisioner: Arc<dyn Provisioner>,
    pub inventory: Arc<dyn ReleaseInventory>,
    pub events: Arc<EventLog>,
}

/// The dispatcher actor. It alone owns the pending queue and the counters; workers
/// only see admitted tasks and report back over the completion channel.
///
/// The release lookup behind the quota runs in its own task, one at a time, so
/// requests are answered while it is outstanding.
pub struct AdmissionQueue {
    receiver: mpsc::Receiver<QueueRequest>,
    limits: AdmissionLimits,
    pending: VecDeque<StoreTask>,
    /// Store ids that are pending, under a quota check, or in flight, with multiplicity.
    tracked: HashMap<String, usize>,
    /// Store ids admitted and not finished yet, with multiplicity.
    running: HashMap<String, usize>,
    checking: bool,
    stats: QueueStats,
}

impl AdmissionQueue {
    pub fn new(limits: AdmissionLimits, buffer_size: usize) -> (Self, QueueClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let queue = Self {
            receiver,
            limits,
            pending: VecDeque::new(),
            tracked: HashMap::new(),
            running: HashMap::new(),
            checking: false,
            stats: QueueStats::default(),
        };
        (queue, QueueClient::new(sender))
    }

    /// Runs the dispatcher until every [`QueueClient`] is dropped and the in-flight
    /// runs have finished. Tasks that were never admitted are discarded.
    pub async fn run(mut self, context: QueueContext) {
        let workers = self.limits.max_concurrent.max(1);
        info!(
            workers,
            max_stores_total = self.limits.max_stores_total,
            allow_duplicates = self.limits.allow_duplicates,
            "Admission queue started"
        );

        let (work_tx, work_rx) = mpsc::channel::<StoreTask>(workers);
        let (done_tx, mut done_rx) = mpsc::channel::<Completion>(workers);
        let handles = spawn_pool(
            workers,
            Arc::new(Mutex::new(work_rx)),
            done_tx,
            context.provisioner.clone(),
        );

        let (check_tx, mut check_rx) = mpsc::channel::<AdmissionCheck>(1);

        let mut accepting = true;
        loop {
            if !accepting && self.stats.active == 0 && !self.checking {
                break;
            }

            tokio::select! {
                request = self.receiver.recv(), if accepting => match request {
                    Some(request) => self.handle(request, &context),
                    None => {
                        info!(in_flight = self.stats.active, "All queue clients dropped");
                        accepting = false;
                    }
                },
                Some(done) = done_rx.recv() => self.complete(done),
                Some(check) = check_rx.recv() => {
                    self.checking = false;
                    if accepting {
                        self.admit(check, &context, &work_tx).await;
                    } else {
                        warn!(store_id = %check.task.store_id, "Discarding task that was never admitted");
                        self.untrack(&check.task.store_id);
                    }
                    self.sync_pending();
                }
                else => break,
            }

            if accepting {
                self.drain(&context, &check_tx);
            }
        }

        for task in self.pending.drain(..) {
            warn!(store_id = %task.store_id, "Discarding task that was never admitted");
        }
        drop(work_tx);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker ended abnormally");
            }
        }

        info!(
            admitted = self.stats.admitted,
            rejected = self.stats.rejected,
            succeeded = self.stats.succeeded,
            degraded = self.stats.degraded,
            failed = self.stats.failed,
            "Admission queue stopped"
        );
    }

    fn handle(&mut self, request: QueueRequest, context: &QueueContext) {
        match request {
            QueueRequest::Enqueue { task, respond_to } => {
                let receipt = self.enqueue(task, &context.events);
                let _ = respond_to.send(receipt);
            }
            QueueRequest::Stats { respond_to } => {
                let _ = respond_to.send(self.stats);
            }
        }
    }

    fn enqueue(&mut self, task: StoreTask, events: &EventLog) -> EnqueueReceipt {
        let store_id = task.store_id.clone();

        if !self.limits.allow_duplicates && self.tracked.contains_key(&store_id) {
            debug!(store_id = %store_id, "Duplicate enqueue ignored");
            events.warning(
                format!("Store {store_id} is already queued or provisioning"),
                Some(&store_id),
            );
            return EnqueueReceipt {
                status: EnqueueStatus::AlreadyPending,
                store_id,
            };
        }

        *self.tracked.entry(store_id.clone()).or_insert(0) += 1;
        self.pending.push_back(task);
        self.sync_pending();
        debug!(store_id = %store_id, pending = self.stats.pending, "Task queued");

        EnqueueReceipt {
            status: EnqueueStatus::Queued,
            store_id,
        }
    }

    /// Starts the quota check for the head-of-queue task when a worker slot is free
    /// and no other check is outstanding. The task stays counted as pending until
    /// [`admit`](Self::admit) decides it.
    fn drain(&mut self, context: &QueueContext, check_tx: &mpsc::Sender<AdmissionCheck>) {
        if self.checking || self.stats.active >= self.limits.max_concurrent.max(1) {
            return;
        }
        let Some(task) = self.pending.pop_front() else {
            return;
        };
        self.checking = true;
        self.sync_pending();

        let inventory = context.inventory.clone();
        let check_tx = check_tx.clone();
        tokio::spawn(async move {
            let live = inventory.live_releases().await;
            let _ = check_tx.send(AdmissionCheck { task, live }).await;
        });
    }

    /// Admits or rejects a task whose release lookup has come back.
    async fn admit(
        &mut self,
        check: AdmissionCheck,
        context: &QueueContext,
        work_tx: &mpsc::Sender<StoreTask>,
    ) {
        let AdmissionCheck { task, live } = check;

        match live {
            Ok(releases) => {
                if let Err(e) = self.check_quota(&releases) {
                    warn!(store_id = %task.store_id, error = %e, class = ?e.class(), "Task rejected");
                    context.events.error(e.to_string(), Some(&task.store_id));
                    self.stats.rejected += 1;
                    self.untrack(&task.store_id);
                    return;
                }
            }
            Err(e) => {
                warn!(store_id = %task.store_id, error = %e, "Release inventory unavailable, admitting");
            }
        }

        self.stats.active += 1;
        self.stats.admitted += 1;
        self.stats.peak_active = self.stats.peak_active.max(self.stats.active);
        *self.running.entry(task.store_id.clone()).or_insert(0) += 1;
        context.events.info(
            format!("Provisioning to Cloud: {}", task.store_id),
            Some(&task.store_id),
        );

        if let Err(mpsc::error::SendError(task)) = work_tx.send(task).await {
            warn!(store_id = %task.store_id, "Worker pool closed");
            self.stats.active -= 1;
            self.release(&task.store_id);
            self.untrack(&task.store_id);
        }
    }

    /// Counts listed releases together with admitted stores the listing does not
    /// show yet.
    fn check_quota(&self, releases: &[String]) -> Result<(), ProvisionError> {
        let live = releases
            .iter()
            .map(String::as_str)
            .chain(self.running.keys().map(String::as_str))
            .collect::<HashSet<_>>()
            .len();
        let limit = self.limits.max_stores_total;

        if live >= limit {
            Err(ProvisionError::QuotaExceeded { live, limit })
        } else {
            Ok(())
        }
    }

    fn complete(&mut self, done: Completion) {
        self.stats.active = self.stats.active.saturating_sub(1);
        match done.outcome {
            RunOutcome::Succeeded { degraded } => {
                self.stats.succeeded += 1;
                if degraded {
                    self.stats.degraded += 1;
                }
            }
            RunOutcome::Failed(class) => {
                debug!(store_id = %done.store_id, ?class, "Run failed");
                self.stats.failed += 1;
            }
        }
        self.release(&done.store_id);
        self.untrack(&done.store_id);
        debug!(store_id = %done.store_id, outcome = ?done.outcome, active = self.stats.active, "Task finished");
    }

    fn sync_pending(&mut self) {
        self.stats.pending = self.pending.len() + usize::from(self.checking);
    }

    fn release(&mut self, store_id: &str) {
        if let Some(count) = self.running.get_mut(store_id) {
            *count -= 1;
            if *count == 0 {
                self.running.remove(store_id);
            }
        }
    }

    fn untrack(&mut self, store_id: &str) {
        if let Some(count) = self.tracked.get_mut(store_id) {
            *count -= 1;
            if *count == 0 {
                self.tracked.remove(store_id);
            }
        }
    }
}
