//! Namespace guardrails: a resource quota and an ingress policy per store.
//!
//! Hardening is best-effort. A store whose policies could not be applied is still
//! served; the failure is recorded as a WARNING.

use crate::cluster::Kubectl;
use crate::error::ProvisionError;
use crate::events::EventLog;
use std::sync::Arc;
use tracing::instrument;

pub fn render_resource_quota(namespace: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: ResourceQuota
metadata:
  name: store-quota
  namespace: {namespace}
spec:
  hard:
    pods: "10"
    requests.cpu: "1"
    requests.memory: "1Gi"
    limits.cpu: "2"
    limits.memory: "2Gi"
"#
    )
}

pub fn render_network_policy(namespace: &str) -> String {
    format!(
        r#"apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: isolate-store
  namespace: {namespace}
spec:
  podSelector: {{}}
  policyTypes:
  - Ingress
  ingress:
  - from:
    - ipBlock:
        cidr: 0.0.0.0/0
"#
    )
}

/// Applies quota and network policy to store namespaces.
#[derive(Clone)]
pub struct HardeningApplier {
    kubectl: Kubectl,
    events: Arc<EventLog>,
}

impl HardeningApplier {
    pub fn new(kubectl: Kubectl, events: Arc<EventLog>) -> Self {
        Self { kubectl, events }
    }

    #[instrument(skip(self))]
    pub async fn harden(&self, store_id: &str) -> Result<(), ProvisionError> {
        self.events
            .info("Applying Security Forcefields...", Some(store_id));

        match self.apply(store_id).await {
            Ok(()) => {
                self.events
                    .success("Namespace Shielded (Quota + Firewall)", Some(store_id));
                Ok(())
            }
            Err(e) => {
                self.events
                    .warning(format!("Hardening Warning: {e}"), Some(store_id));
                Err(ProvisionError::Hardening(e))
            }
        }
    }

    async fn apply(&self, store_id: &str) -> Result<(), crate::cluster::CommandError> {
        self.kubectl
            .apply_manifest(&format!("temp_quota_{store_id}"), &render_resource_quota(store_id))
            .await?;
        self.kubectl
            .apply_manifest(&format!("temp_netpol_{store_id}"), &render_network_policy(store_id))
            .await
    }
}
