//! Error types for store provisioning.

use crate::cluster::CommandError;
use thiserror::Error;

/// How a failure affects the store it happened to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The remaining phases are skipped and the task is discarded.
    FatalToTask,
    /// Recorded, but the store can still be reported ready.
    Degraded,
    /// The task was dropped before any cluster mutation.
    AdmissionRejected,
}

/// Errors raised by the lifecycle phases, the upgrade/rollback paths, and admission.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The chart could not be installed.
    #[error("deploy failed: {0}")]
    Deploy(#[source] CommandError),

    /// Pods did not all become ready within the readiness budget.
    #[error("Pod timeout: {0}")]
    PodTimeout(#[source] CommandError),

    /// The namespace had no pod to run content commands in.
    #[error("no workload pod found in namespace {0}")]
    NoWorkload(String),

    /// Pod lookup itself failed.
    #[error("workload lookup failed: {0}")]
    WorkloadLookup(#[source] CommandError),

    /// The load balancer never assigned an external address.
    #[error("no public address assigned after {attempts} attempts")]
    NoPublicAddress { attempts: u32 },

    /// The database never accepted the configuration command.
    #[error("database never ready after {attempts} attempts")]
    DatabaseNeverReady { attempts: u32 },

    /// One of the content installation steps failed.
    #[error("content bootstrap step '{step}' failed: {source}")]
    Bootstrap {
        step: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("hardening failed: {0}")]
    Hardening(#[source] CommandError),

    #[error("credential provisioning failed: {0}")]
    Credential(#[source] CommandError),

    #[error("front page configuration failed: {0}")]
    Finalize(#[source] CommandError),

    /// `live` counts deployed releases plus admitted stores not yet listed.
    #[error("Quota Exceeded. Max {limit} stores allowed.")]
    QuotaExceeded { live: usize, limit: usize },

    #[error("upgrade failed: {0}")]
    Upgrade(#[source] CommandError),

    #[error("rollback failed: {0}")]
    Rollback(#[source] CommandError),
}

impl ProvisionError {
    pub fn class(&self) -> FailureClass {
        match self {
            ProvisionError::Hardening(_)
            | ProvisionError::Credential(_)
            | ProvisionError::Finalize(_) => FailureClass::Degraded,
            ProvisionError::QuotaExceeded { .. } => FailureClass::AdmissionRejected,
            _ => FailureClass::FatalToTask,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == FailureClass::FatalToTask
    }
}

/// What a successful provisioning run had to put up with.
#[derive(Debug, Default)]
pub struct ProvisionReport {
    /// Non-fatal failures, in the order they happened.
    pub degraded: Vec<ProvisionError>,
}

impl ProvisionReport {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// Keeps a non-fatal failure and hands a fatal one back to the caller.
    /// `Ok(None)` means the step failed but the run goes on.
    pub fn tolerate<T>(&mut self, result: Result<T, ProvisionError>) -> Result<Option<T>, ProvisionError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.degraded.push(e);
                Ok(None)
            }
        }
    }
}
