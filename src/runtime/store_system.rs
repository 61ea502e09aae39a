use crate::cluster::{CommandRunner, Helm, Kubectl, ProcessRunner};
use crate::config::{OrchestratorConfig, PhaseTimings, StoreProfile};
use crate::controller::LifecycleController;
use crate::events::EventLog;
use crate::queue::{AdmissionQueue, QueueContext};
use crate::service::StoreService;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

const QUEUE_BUFFER: usize = 64;

/// The running orchestrator: shared event log, lifecycle controller, admission
/// queue, and the service the HTTP layer talks to.
///
/// ```ignore
/// let system = StoreSystem::start(&config);
/// let app = api::router(system.service.clone(), &config.public_dir);
/// // ... serve ...
/// system.shutdown().await?;
/// ```
pub struct StoreSystem {
    pub service: StoreService,
    pub events: Arc<EventLog>,
    handles: Vec<JoinHandle<()>>,
}

impl StoreSystem {
    /// Starts against the real `helm` and `kubectl` binaries.
    pub fn start(config: &OrchestratorConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(&config.work_dir));
        let events = Arc::new(EventLog::new(config.work_dir.join(&config.audit_file)));
        if let Some(path) = events.audit_path() {
            info!(path = %path.display(), "Audit log");
        }
        Self::with_runner(config, runner, events, PhaseTimings::default())
    }

    /// Starts with an explicit command runner, event log and timings.
    pub fn with_runner(
        config: &OrchestratorConfig,
        runner: Arc<dyn CommandRunner>,
        events: Arc<EventLog>,
        timings: PhaseTimings,
    ) -> Self {
        let chart = config.chart_source();
        info!(
            chart = %chart.chart_path.display(),
            values = %chart.values_path.display(),
            "Using store chart"
        );

        let helm = Helm::new(runner.clone(), chart);
        let kubectl = Kubectl::new(runner);
        let profile = StoreProfile::default();

        let controller = Arc::new(
            LifecycleController::new(helm.clone(), kubectl.clone(), events.clone())
                .with_profile(profile.clone())
                .with_timings(timings)
                .with_demo_mode(config.demo_mode),
        );

        let (queue, queue_client) = AdmissionQueue::new(config.limits(), QUEUE_BUFFER);
        let queue_handle = tokio::spawn(queue.run(QueueContext {
            provisioner: controller.clone(),
            inventory: Arc::new(helm.clone()),
            events: events.clone(),
        }));

        let service = StoreService::new(helm, kubectl, controller, queue_client, events.clone())
            .with_profile(profile);

        Self {
            service,
            events,
            handles: vec![queue_handle],
        }
    }

    /// Drops this system's queue handle and waits for the queue to finish its
    /// in-flight work. Clones of [`service`](Self::service) held elsewhere must be
    /// dropped first.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        info!("Shutting down orchestrator...");
        drop(self.service);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Runtime task failed");
                return Err(e);
            }
        }

        info!("Orchestrator shutdown complete.");
        Ok(())
    }
}
