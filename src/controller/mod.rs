//! # Lifecycle Controller
//!
//! Drives one store from an empty namespace to a reachable shop, and moves existing
//! stores between chart revisions.
//!
//! ## Provisioning phases
//!
//! [`LifecycleController::provision`] runs these strictly in order. A failing
//! required phase skips everything after it and is recorded as `Failed: <cause>`.
//!
//! | Phase | On failure |
//! |-------|------------|
//! | Deploy (`helm install`) | fatal |
//! | Harden (quota + network policy) | warning, continue |
//! | Await workload readiness | fatal |
//! | Await public address | fatal |
//! | Credential secret | error event, continue |
//! | Content bootstrap | fatal |
//! | Finalize front page | warning, store still reported ready |
//!
//! Non-fatal failures are kept in the returned [`ProvisionReport`].
//!
//! Every wait is a [`poll`] bounded by [`PhaseTimings`]; the timers belong to the
//! provisioning future and stop with it.

mod bootstrap;
pub mod poll;

pub use poll::{poll, Attempt, PollPolicy};

use crate::cluster::{CommandError, Helm, Kubectl};
use crate::config::{PhaseTimings, StoreProfile};
use crate::error::{ProvisionError, ProvisionReport};
use crate::events::EventLog;
use crate::hardening::HardeningApplier;
use crate::queue::Provisioner;
use crate::secrets::{generate_credential, SecretProvisioner};
use async_trait::async_trait;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Revision argument that makes `helm rollback` target the previous release.
pub const PREVIOUS_REVISION: u32 = 0;

pub struct LifecycleController {
    helm: Helm,
    kubectl: Kubectl,
    events: Arc<EventLog>,
    profile: StoreProfile,
    timings: PhaseTimings,
    demo_mode: bool,
    hardening: HardeningApplier,
    secrets: SecretProvisioner,
}

impl LifecycleController {
    pub fn new(helm: Helm, kubectl: Kubectl, events: Arc<EventLog>) -> Self {
        Self {
            hardening: HardeningApplier::new(kubectl.clone(), events.clone()),
            secrets: SecretProvisioner::new(kubectl.clone(), events.clone()),
            helm,
            kubectl,
            events,
            profile: StoreProfile::default(),
            timings: PhaseTimings::default(),
            demo_mode: false,
        }
    }

    pub fn with_profile(mut self, profile: StoreProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_timings(mut self, timings: PhaseTimings) -> Self {
        self.timings = timings;
        self
    }

    /// When enabled the generated admin password is written to the event log.
    pub fn with_demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = demo_mode;
        self
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Provisions `store_id` end to end. Fatal failures are recorded as ERROR before
    /// being returned; non-fatal ones come back in the [`ProvisionReport`].
    #[instrument(skip(self))]
    pub async fn provision(&self, store_id: &str) -> Result<ProvisionReport, ProvisionError> {
        match self.run_phases(store_id).await {
            Ok(report) => {
                info!(store_id, degraded = report.degraded.len(), "Store provisioned");
                Ok(report)
            }
            Err(e) => {
                error!(store_id, error = %e, "Provisioning failed");
                self.events.error(format!("Failed: {e}"), Some(store_id));
                Err(e)
            }
        }
    }

    async fn run_phases(&self, store_id: &str) -> Result<ProvisionReport, ProvisionError> {
        let mut report = ProvisionReport::default();

        self.helm
            .install(store_id)
            .await
            .map_err(ProvisionError::Deploy)?;

        if report.tolerate(self.hardening.harden(store_id).await)?.is_none() {
            debug!(store_id, "Continuing without hardening");
        }

        self.events
            .info("Waiting for cloud resources...", Some(store_id));
        self.kubectl
            .wait_pods_ready(store_id, self.timings.pod_ready_timeout)
            .await
            .map_err(ProvisionError::PodTimeout)?;

        let address = self.await_public_address(store_id).await?;

        let credential = generate_credential();
        let stored = report
            .tolerate(self.secrets.provision_credential(store_id, &credential).await)?
            .is_some();
        if !stored {
            debug!(store_id, "Continuing without credential secret");
        }

        let pod = self
            .bootstrap_content(store_id, &address, &credential)
            .await?;

        let login = AdminLogin {
            credential: &credential,
            stored,
        };
        report.tolerate(self.finalize(store_id, &pod, &address, login).await)?;
        Ok(report)
    }

    /// Polls the store service until the load balancer publishes an address.
    async fn await_public_address(&self, store_id: &str) -> Result<String, ProvisionError> {
        let policy = self.timings.public_address;
        let progress_every = self.timings.address_progress_every.max(1);
        let service = self.profile.service_name.as_str();

        let found = poll(policy, move |attempt: Attempt| async move {
            let address = match self.kubectl.service_ingress_ip(store_id, service).await {
                Ok(address) => address,
                Err(e) => {
                    debug!(store_id, attempt = attempt.number, error = %e, "Address lookup failed");
                    None
                }
            };
            if address.is_none() && attempt.remaining % progress_every == 0 {
                self.events.info("Waiting for Public IP...", Some(store_id));
            }
            Ok::<_, Infallible>(address)
        })
        .await
        .unwrap_or_else(|never| match never {});

        match found {
            Some(address) => {
                self.events
                    .success(format!("Found Public IP: {address}"), Some(store_id));
                Ok(address)
            }
            None => Err(ProvisionError::NoPublicAddress {
                attempts: policy.max_attempts,
            }),
        }
    }

    /// Rolls the release forward to the current chart and re-applies hardening.
    #[instrument(skip(self))]
    pub async fn upgrade(&self, store_id: &str) -> Result<(), ProvisionError> {
        self.events
            .info(format!("Upgrading Store: {store_id}..."), Some(store_id));

        if let Err(e) = self.helm.upgrade(store_id).await {
            self.events
                .error(format!("Upgrade Failed: {e}"), Some(store_id));
            return Err(ProvisionError::Upgrade(e));
        }

        if let Err(e) = self.hardening.harden(store_id).await {
            debug!(store_id, error = %e, "Upgrade kept without hardening");
        }

        self.events
            .success("Upgrade Complete (Revision Bumped)", Some(store_id));
        Ok(())
    }

    /// Reverts the release to its previous revision.
    #[instrument(skip(self))]
    pub async fn rollback(&self, store_id: &str) -> Result<(), ProvisionError> {
        self.events
            .info(format!("Rewinding Time (Rollback): {store_id}..."), Some(store_id));

        match self.helm.rollback(store_id, PREVIOUS_REVISION).await {
            Ok(()) => {
                self.events.warning(
                    "Rollback Successful. Reverted to previous version.",
                    Some(store_id),
                );
                Ok(())
            }
            Err(e) => {
                self.events
                    .error(format!("Rollback Failed: {e}"), Some(store_id));
                Err(ProvisionError::Rollback(e))
            }
        }
    }
}

/// The generated admin password and whether its secret was written.
#[derive(Clone, Copy)]
struct AdminLogin<'a> {
    credential: &'a str,
    stored: bool,
}

#[async_trait]
impl Provisioner for LifecycleController {
    async fn provision(&self, store_id: &str) -> Result<ProvisionReport, ProvisionError> {
        LifecycleController::provision(self, store_id).await
    }
}

fn step_failed(step: &'static str) -> impl FnOnce(CommandError) -> ProvisionError {
    move |source| ProvisionError::Bootstrap { step, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::mock::ScriptedRunner;
    use crate::cluster::ChartSource;
    use crate::model::EventType;

    fn controller(runner: &ScriptedRunner, dir: &std::path::Path) -> LifecycleController {
        let runner: Arc<dyn crate::cluster::CommandRunner> = Arc::new(runner.clone());
        let helm = Helm::new(
            runner.clone(),
            ChartSource {
                chart_path: "chart".into(),
                values_path: "values.yaml".into(),
            },
        );
        let kubectl = Kubectl::new(runner).with_staging_dir(dir);
        LifecycleController::new(helm, kubectl, Arc::new(EventLog::in_memory()))
            .with_timings(PhaseTimings::immediate())
    }

    #[tokio::test]
    async fn deploy_failure_skips_every_later_phase() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::strict();
        runner.expect("helm install").return_err("chart not found");
        let controller = controller(&runner, dir.path());

        let err = controller.provision("shop").await.unwrap_err();

        assert!(matches!(err, ProvisionError::Deploy(_)));
        assert_eq!(runner.calls().len(), 1);
        let latest = &controller.events().snapshot()[0];
        assert_eq!(latest.kind, EventType::Error);
        assert!(latest.message.starts_with("Failed: deploy failed"));
    }

    #[tokio::test]
    async fn pod_timeout_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::permissive();
        runner.expect("kubectl wait").return_err("timed out waiting for the condition");
        let controller = controller(&runner, dir.path());

        let err = controller.provision("shop").await.unwrap_err();

        assert!(matches!(err, ProvisionError::PodTimeout(_)));
        assert_eq!(runner.count("get svc"), 0);
        assert!(controller.events().snapshot()[0].message.contains("Pod timeout"));
    }

    #[tokio::test]
    async fn upgrade_reapplies_hardening() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::permissive();
        let controller = controller(&runner, dir.path());

        controller.upgrade("shop").await.unwrap();

        assert!(runner.position("helm upgrade shop chart").unwrap() < runner.position("kubectl apply").unwrap());
        let latest = &controller.events().snapshot()[0];
        assert_eq!(latest.kind, EventType::Success);
        assert_eq!(latest.message, "Upgrade Complete (Revision Bumped)");
    }

    #[tokio::test]
    async fn failed_upgrade_stops_before_hardening() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::permissive();
        runner.expect("helm upgrade").return_err("another operation is in progress");
        let controller = controller(&runner, dir.path());

        let err = controller.upgrade("shop").await.unwrap_err();

        assert!(matches!(err, ProvisionError::Upgrade(_)));
        assert_eq!(runner.count("kubectl apply"), 0);
        assert!(controller.events().snapshot()[0].message.starts_with("Upgrade Failed"));
    }

    #[tokio::test]
    async fn rollback_targets_previous_revision() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::permissive();
        let controller = controller(&runner, dir.path());

        controller.rollback("shop").await.unwrap();

        assert_eq!(runner.count("helm rollback shop 0 --namespace shop"), 1);
        assert_eq!(controller.events().snapshot()[0].kind, EventType::Warning);
    }

    #[tokio::test]
    async fn rollback_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::permissive();
        runner.expect("helm rollback").return_err("release has no 0 version");
        let controller = controller(&runner, dir.path());

        assert!(controller.rollback("shop").await.is_err());
        let latest = &controller.events().snapshot()[0];
        assert_eq!(latest.kind, EventType::Error);
        assert!(latest.message.starts_with("Rollback Failed"));
    }
}
