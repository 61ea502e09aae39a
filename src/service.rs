//! Store operations behind the HTTP API.
//!
//! [`StoreService`] is the synchronous face of the orchestrator: it queues new
//! stores, runs deletes, upgrades, rollbacks and domain links inline, and reports
//! inventory.

use crate::cluster::{CommandError, Helm, Kubectl};
use crate::config::StoreProfile;
use crate::controller::LifecycleController;
use crate::error::ProvisionError;
use crate::events::EventLog;
use crate::model::{EnqueueReceipt, LogEntry, StoreSummary};
use crate::queue::{QueueClient, QueueError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid store name: {0:?}")]
    InvalidName(String),

    #[error("invalid domain: {0:?}")]
    InvalidDomain(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Cluster(#[from] CommandError),
}

impl ServiceError {
    /// Whether the caller sent something unusable, as opposed to an operation failing.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ServiceError::InvalidName(_) | ServiceError::InvalidDomain(_))
    }
}

/// Turns a display name into a store id: lowercase, and every character outside
/// `[a-z0-9-]` replaced by `-`. An id may not start with `-`, since it is passed to
/// `helm` and `kubectl` as a positional argument.
pub fn normalize_store_id(name: &str) -> Result<String, ServiceError> {
    let id: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '-',
        })
        .collect();

    if id.is_empty() || id.starts_with('-') {
        return Err(ServiceError::InvalidName(name.to_string()));
    }
    Ok(id)
}

/// Accepts only ids that are already in normalized form.
pub fn validate_store_id(id: &str) -> Result<(), ServiceError> {
    match normalize_store_id(id) {
        Ok(normalized) if normalized == id => Ok(()),
        _ => Err(ServiceError::InvalidName(id.to_string())),
    }
}

/// A domain must fit in a namespace label value.
fn validate_domain(domain: &str) -> Result<(), ServiceError> {
    let valid = !domain.is_empty()
        && domain.len() <= 63
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && domain.starts_with(|c: char| c.is_ascii_alphanumeric())
        && domain.ends_with(|c: char| c.is_ascii_alphanumeric());

    if valid {
        Ok(())
    } else {
        Err(ServiceError::InvalidDomain(domain.to_string()))
    }
}

#[derive(Clone)]
pub struct StoreService {
    helm: Helm,
    kubectl: Kubectl,
    controller: Arc<LifecycleController>,
    queue: QueueClient,
    events: Arc<EventLog>,
    profile: StoreProfile,
}

impl StoreService {
    pub fn new(
        helm: Helm,
        kubectl: Kubectl,
        controller: Arc<LifecycleController>,
        queue: QueueClient,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            helm,
            kubectl,
            controller,
            queue,
            events,
            profile: StoreProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: StoreProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn queue(&self) -> &QueueClient {
        &self.queue
    }

    /// Newest first.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.events.snapshot()
    }

    /// Every release with its public URL. An inventory failure yields an empty list;
    /// an address lookup failure yields `access_url: None` for that store only.
    #[instrument(skip(self))]
    pub async fn list_stores(&self) -> Vec<StoreSummary> {
        let releases = match self.helm.list().await {
            Ok(releases) => releases,
            Err(e) => {
                warn!(error = %e, "Release listing failed");
                return Vec::new();
            }
        };

        let mut stores = Vec::with_capacity(releases.len());
        for release in releases {
            let access_url = match self
                .kubectl
                .service_ingress_ip(&release.name, &self.profile.service_name)
                .await
            {
                Ok(ip) => ip.map(|ip| format!("http://{ip}")),
                Err(e) => {
                    warn!(store_id = %release.name, error = %e, "Address lookup failed");
                    None
                }
            };
            stores.push(StoreSummary {
                release,
                access_url,
            });
        }
        stores
    }

    /// Normalizes `store_name` and queues it for provisioning.
    #[instrument(skip(self))]
    pub async fn create_store(&self, store_name: &str) -> Result<EnqueueReceipt, ServiceError> {
        let store_id = normalize_store_id(store_name)?;
        let receipt = self.queue.enqueue(store_id).await?;
        info!(store_id = %receipt.store_id, status = ?receipt.status, "Store requested");
        Ok(receipt)
    }

    /// Removes the release, the namespace and any leftover volume claims.
    #[instrument(skip(self))]
    pub async fn delete_store(&self, store_id: &str) -> Result<(), ServiceError> {
        validate_store_id(store_id)?;

        match self.teardown(store_id).await {
            Ok(()) => {
                self.events
                    .success(format!("Deleted {store_id}"), Some(store_id));
                Ok(())
            }
            Err(e) => {
                self.events
                    .error(format!("Delete Failed: {e}"), Some(store_id));
                Err(e.into())
            }
        }
    }

    async fn teardown(&self, store_id: &str) -> Result<(), CommandError> {
        self.helm.uninstall(store_id).await?;
        self.kubectl.delete_namespace(store_id).await?;
        self.kubectl.delete_pvcs(store_id).await
    }

    pub async fn upgrade_store(&self, store_id: &str) -> Result<(), ServiceError> {
        validate_store_id(store_id)?;
        Ok(self.controller.upgrade(store_id).await?)
    }

    pub async fn rollback_store(&self, store_id: &str) -> Result<(), ServiceError> {
        validate_store_id(store_id)?;
        Ok(self.controller.rollback(store_id).await?)
    }

    /// Labels the store namespace with its custom domain.
    #[instrument(skip(self))]
    pub async fn link_domain(&self, store_id: &str, domain: &str) -> Result<(), ServiceError> {
        validate_store_id(store_id)?;
        validate_domain(domain)?;

        self.events.info(
            format!("Linking Custom Domain: {domain} to {store_id}..."),
            Some(store_id),
        );

        match self
            .kubectl
            .label_namespace(store_id, "custom-domain", domain)
            .await
        {
            Ok(()) => {
                self.events.success(
                    format!("Domain Linked: https://{domain} -> {store_id}"),
                    Some(store_id),
                );
                Ok(())
            }
            Err(e) => {
                self.events
                    .error(format!("Link Failed: {e}"), Some(store_id));
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_display_names() {
        assert_eq!(normalize_store_id("My Shop!").unwrap(), "my-shop-");
        assert_eq!(normalize_store_id("shop-01").unwrap(), "shop-01");
        assert_eq!(normalize_store_id("Café").unwrap(), "caf-");
        assert!(normalize_store_id("").unwrap_err().is_invalid_input());
    }

    #[test]
    fn ids_never_look_like_flags() {
        assert!(normalize_store_id("--dry-run").unwrap_err().is_invalid_input());
        assert!(normalize_store_id(" shop").is_err());
        assert!(validate_store_id("-n").is_err());
        assert!(validate_store_id("--dry-run").is_err());
    }

    #[test]
    fn path_ids_must_already_be_normalized() {
        assert!(validate_store_id("my-shop-").is_ok());
        assert!(validate_store_id("My-Shop").is_err());
        assert!(validate_store_id("shop;rm").is_err());
        assert!(validate_store_id("").is_err());
    }

    #[test]
    fn domains_fit_label_values() {
        assert!(validate_domain("shop.example.com").is_ok());
        assert!(validate_domain("").is_err());
        assert!(validate_domain("shop.example.com/admin").is_err());
        assert!(validate_domain("-shop.com").is_err());
        assert!(validate_domain(&"a".repeat(64)).is_err());
    }
}
