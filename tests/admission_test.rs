use async_trait::async_trait;
use clap::Parser;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use store_orchestrator::cluster::mock::ScriptedRunner;
use store_orchestrator::cluster::CommandError;
use store_orchestrator::config::{OrchestratorConfig, PhaseTimings};
use store_orchestrator::error::{ProvisionError, ProvisionReport};
use store_orchestrator::events::EventLog;
use store_orchestrator::model::{EnqueueStatus, EventType, QueueStats};
use store_orchestrator::queue::{
    AdmissionLimits, AdmissionQueue, Provisioner, QueueClient, QueueContext, ReleaseInventory,
};
use store_orchestrator::runtime::StoreSystem;

/// Records how many runs overlap and counts every finished store as live.
///
/// Ids starting with `broken` fail, `panic` panics, and `degraded` succeed with a
/// non-fatal failure.
#[derive(Default)]
struct SlowProvisioner {
    running: AtomicUsize,
    peak: AtomicUsize,
    created: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Provisioner for SlowProvisioner {
    async fn provision(&self, store_id: &str) -> Result<ProvisionReport, ProvisionError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(15)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if store_id.starts_with("broken") {
            return Err(ProvisionError::NoWorkload(store_id.to_string()));
        }
        if store_id.starts_with("panic") {
            panic!("provisioning {store_id} blew up");
        }

        let mut report = ProvisionReport::default();
        if store_id.starts_with("degraded") {
            report.degraded.push(ProvisionError::Credential(CommandError::Failed {
                command: "kubectl apply -f secret.yaml".into(),
                code: Some(1),
                stderr: "forbidden".into(),
            }));
        }
        self.created.lock().unwrap().push(store_id.to_string());
        Ok(report)
    }
}

/// Reports a fixed number of pre-existing stores plus whatever was created since.
struct CountingInventory {
    existing: usize,
    created: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ReleaseInventory for CountingInventory {
    async fn live_releases(&self) -> Result<Vec<String>, CommandError> {
        let mut names: Vec<String> = (0..self.existing).map(|i| format!("existing-{i}")).collect();
        names.extend(self.created.lock().unwrap().iter().cloned());
        Ok(names)
    }
}

fn start_queue(
    limits: AdmissionLimits,
    existing: usize,
) -> (QueueClient, Arc<SlowProvisioner>, Arc<EventLog>) {
    let provisioner = Arc::new(SlowProvisioner::default());
    let events = Arc::new(EventLog::in_memory());
    let (queue, client) = AdmissionQueue::new(limits, 32);
    tokio::spawn(queue.run(QueueContext {
        provisioner: provisioner.clone(),
        inventory: Arc::new(CountingInventory {
            existing,
            created: provisioner.created.clone(),
        }),
        events: events.clone(),
    }));
    (client, provisioner, events)
}

async fn wait_for(client: &QueueClient, done: impl Fn(&QueueStats) -> bool) -> QueueStats {
    for _ in 0..400 {
        let stats = client.stats().await.unwrap();
        if done(&stats) {
            return stats;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("queue did not settle: {:?}", client.stats().await.unwrap());
}

#[tokio::test]
async fn test_never_more_than_two_in_flight() {
    let (client, provisioner, _events) = start_queue(
        AdmissionLimits {
            max_stores_total: 100,
            ..AdmissionLimits::default()
        },
        0,
    );

    for i in 0..6 {
        client.enqueue(format!("shop-{i}")).await.unwrap();
    }
    let stats = wait_for(&client, |s| s.finished() == 6).await;

    assert_eq!(stats.active, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.admitted, 6);
    assert!(stats.peak_active <= 2);
    assert!(provisioner.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_admission_is_fifo() {
    let (client, _provisioner, events) = start_queue(
        AdmissionLimits {
            max_concurrent: 1,
            max_stores_total: 100,
            allow_duplicates: false,
        },
        0,
    );

    for name in ["alpha", "bravo", "charlie", "delta"] {
        client.enqueue(name).await.unwrap();
    }
    wait_for(&client, |s| s.finished() == 4).await;

    let admitted: Vec<String> = events
        .snapshot()
        .into_iter()
        .rev()
        .filter(|e| e.message.starts_with("Provisioning to Cloud"))
        .filter_map(|e| e.store_id)
        .collect();
    assert_eq!(admitted, ["alpha", "bravo", "charlie", "delta"]);
}

#[tokio::test]
async fn test_failed_runs_release_their_slot() {
    let (client, _provisioner, _events) = start_queue(
        AdmissionLimits {
            max_stores_total: 100,
            ..AdmissionLimits::default()
        },
        0,
    );

    for name in ["broken-1", "broken-2", "shop"] {
        client.enqueue(name).await.unwrap();
    }
    let stats = wait_for(&client, |s| s.finished() == 3).await;

    assert_eq!(stats.failed, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn test_panicking_run_releases_its_slot() {
    let (client, _provisioner, _events) = start_queue(
        AdmissionLimits {
            max_stores_total: 100,
            ..AdmissionLimits::default()
        },
        0,
    );

    for name in ["panic-1", "panic-2", "shop"] {
        client.enqueue(name).await.unwrap();
    }
    let stats = wait_for(&client, |s| s.finished() == 3).await;

    assert_eq!(stats.active, 0);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.succeeded, 1);

    // both slots are free again
    client.enqueue("after-1").await.unwrap();
    client.enqueue("after-2").await.unwrap();
    let stats = wait_for(&client, |s| s.finished() == 5).await;
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn test_degraded_runs_are_counted_apart() {
    let (client, _provisioner, _events) = start_queue(
        AdmissionLimits {
            max_stores_total: 100,
            ..AdmissionLimits::default()
        },
        0,
    );

    for name in ["degraded-1", "shop", "broken-1"] {
        client.enqueue(name).await.unwrap();
    }
    let stats = wait_for(&client, |s| s.finished() == 3).await;

    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.degraded, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_quota_counts_runs_not_yet_deployed() {
    let (client, _provisioner, events) = start_queue(AdmissionLimits::default(), 4);

    client.enqueue("fifth").await.unwrap();
    client.enqueue("sixth").await.unwrap();
    let stats = wait_for(&client, |s| s.finished() + s.rejected == 2).await;

    assert_eq!(stats.admitted, 1);
    assert_eq!(stats.rejected, 1);
    let rejected: Vec<_> = events
        .snapshot()
        .into_iter()
        .filter(|e| e.kind == EventType::Error)
        .collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].store_id.as_deref(), Some("sixth"));
    assert_eq!(rejected[0].message, "Quota Exceeded. Max 5 stores allowed.");
}

#[tokio::test]
async fn test_quota_counts_stores_created_while_draining() {
    let (client, _provisioner, events) = start_queue(
        AdmissionLimits {
            max_concurrent: 1,
            max_stores_total: 2,
            allow_duplicates: false,
        },
        1,
    );

    for name in ["first", "second", "third"] {
        client.enqueue(name).await.unwrap();
    }
    let stats = wait_for(&client, |s| s.finished() + s.rejected == 3).await;

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.rejected, 2);
    let rejected: Vec<_> = events
        .snapshot()
        .into_iter()
        .filter(|e| e.kind == EventType::Error)
        .collect();
    assert_eq!(rejected.len(), 2);
    assert!(rejected
        .iter()
        .all(|e| e.message == "Quota Exceeded. Max 2 stores allowed."));
}

#[tokio::test]
async fn test_finished_store_can_be_queued_again() {
    let (client, _provisioner, _events) = start_queue(
        AdmissionLimits {
            max_stores_total: 100,
            ..AdmissionLimits::default()
        },
        0,
    );

    client.enqueue("shop").await.unwrap();
    assert_eq!(
        client.enqueue("shop").await.unwrap().status,
        EnqueueStatus::AlreadyPending
    );
    wait_for(&client, |s| s.finished() == 1).await;

    assert_eq!(client.enqueue("shop").await.unwrap().status, EnqueueStatus::Queued);
}

/// Five stores already exist: the sixth is rejected before anything touches the cluster.
#[tokio::test]
async fn test_sixth_store_rejected_without_cluster_changes() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::strict();
    runner.expect("helm list -A -o json").return_ok(
        r#"[{"name":"s1","namespace":"s1"},{"name":"s2","namespace":"s2"},
            {"name":"s3","namespace":"s3"},{"name":"s4","namespace":"s4"},
            {"name":"s5","namespace":"s5"}]"#,
    );
    let config = OrchestratorConfig::parse_from([
        "store-orchestrator",
        "--work-dir",
        dir.path().to_str().unwrap(),
        "--max-stores-total",
        "5",
        "--max-concurrent",
        "2",
    ]);
    let events = Arc::new(EventLog::in_memory());
    let system = StoreSystem::with_runner(
        &config,
        Arc::new(runner.clone()),
        events.clone(),
        PhaseTimings::immediate(),
    );

    let receipt = system.service.create_store("sixth").await.unwrap();
    assert_eq!(receipt.status, EnqueueStatus::Queued);
    let stats = wait_for(system.service.queue(), |s| s.rejected == 1).await;

    assert_eq!(stats.admitted, 0);
    assert_eq!(runner.calls(), vec!["helm list -A -o json"]);
    let latest = &events.snapshot()[0];
    assert_eq!(latest.kind, EventType::Error);
    assert_eq!(latest.message, "Quota Exceeded. Max 5 stores allowed.");
    assert_eq!(latest.store_id.as_deref(), Some("sixth"));

    system.shutdown().await.unwrap();
}
