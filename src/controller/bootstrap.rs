//! Content bootstrap and front-page finalization, run inside the store's pod.

use super::{poll, step_failed, AdminLogin, LifecycleController};
use crate::cluster::ContentTool;
use crate::error::ProvisionError;
use crate::secrets::secret_name;
use std::convert::Infallible;
use tracing::{debug, info, warn};

impl LifecycleController {
    /// Installs and configures the shop unless it is already installed. Returns the
    /// pod the commands ran in.
    pub(super) async fn bootstrap_content(
        &self,
        store_id: &str,
        address: &str,
        credential: &str,
    ) -> Result<String, ProvisionError> {
        self.events
            .info("Initializing Store Content...", Some(store_id));

        let pod = self
            .kubectl
            .pod_names(store_id)
            .await
            .map_err(ProvisionError::WorkloadLookup)?
            .into_iter()
            .next()
            .ok_or_else(|| ProvisionError::NoWorkload(store_id.to_string()))?;

        let wp = ContentTool::new(&self.kubectl, &self.profile, store_id, pod);

        if let Err(e) = wp.install_cli().await {
            debug!(store_id, error = %e, "wp-cli install skipped");
        }

        self.events
            .info("Configuring Database (Waiting for MySQL)...", Some(store_id));
        if !self.timings.settle_delay.is_zero() {
            tokio::time::sleep(self.timings.settle_delay).await;
        }

        let policy = self.timings.database;
        let wp_ref = &wp;
        let configured = poll(policy, move |attempt| async move {
            match wp_ref.configure_database().await {
                Ok(()) => Ok::<_, Infallible>(Some(())),
                Err(e) => {
                    debug!(store_id, attempt = attempt.number, error = %e, "Database not ready");
                    self.events
                        .warning("MySQL not ready yet. Retrying...", Some(store_id));
                    Ok(None)
                }
            }
        })
        .await
        .unwrap_or_else(|never| match never {});

        if configured.is_none() {
            return Err(ProvisionError::DatabaseNeverReady {
                attempts: policy.max_attempts,
            });
        }

        if wp.is_installed().await {
            info!(store_id, "Store content already installed");
            self.events
                .info("Store already installed, skipping content setup", Some(store_id));
        } else {
            self.install_content(&wp, store_id, address, credential)
                .await?;
        }

        Ok(wp.pod().to_string())
    }

    async fn install_content(
        &self,
        wp: &ContentTool<'_>,
        store_id: &str,
        address: &str,
        credential: &str,
    ) -> Result<(), ProvisionError> {
        let profile = &self.profile;

        self.events
            .info("Installing WooCommerce & Theme...", Some(store_id));

        wp.install_core(&format!("http://{address}"), store_id, credential)
            .await
            .map_err(step_failed("core install"))?;
        wp.install_plugin(&profile.commerce_plugin)
            .await
            .map_err(step_failed("install commerce plugin"))?;
        wp.update_option("woocommerce_coming_soon", "no")
            .await
            .map_err(step_failed("disable coming-soon mode"))?;
        wp.run_commerce_tool("install_pages")
            .await
            .map_err(step_failed("install shop pages"))?;
        wp.install_theme(&profile.theme)
            .await
            .map_err(step_failed("install theme"))?;
        wp.create_product(&profile.sample_product_name, &profile.sample_product_price)
            .await
            .map_err(step_failed("create sample product"))?;

        Ok(())
    }

    /// Points the front page at the shop. The store is reported ready either way; a
    /// command failure comes back as [`ProvisionError::Finalize`] after the warning.
    pub(super) async fn finalize(
        &self,
        store_id: &str,
        pod: &str,
        address: &str,
        login: AdminLogin<'_>,
    ) -> Result<(), ProvisionError> {
        self.events.info("Setting Homepage...", Some(store_id));
        let wp = ContentTool::new(&self.kubectl, &self.profile, store_id, pod);
        let ready = format!("Cloud Store Ready at http://{address}");

        match self.configure_front_page(&wp).await {
            Ok(true) => {
                self.events.success(ready, Some(store_id));
                self.disclose_credential(store_id, login);
                Ok(())
            }
            Ok(false) => {
                self.events
                    .warning("Could not find Shop Page ID.", Some(store_id));
                self.events.success(ready, Some(store_id));
                Ok(())
            }
            Err(e) => {
                warn!(store_id, error = %e, "Front page configuration failed");
                self.events
                    .warning(format!("Homepage config skipped: {e}"), Some(store_id));
                self.events.success(ready, Some(store_id));
                Err(e)
            }
        }
    }

    /// `Ok(false)` when the shop page never appeared.
    async fn configure_front_page(&self, wp: &ContentTool<'_>) -> Result<bool, ProvisionError> {
        wp.update_option("show_on_front", "page")
            .await
            .map_err(ProvisionError::Finalize)?;

        let slug = self.profile.front_page_slug.as_str();
        let page = poll(self.timings.front_page, move |_| async move {
            wp.page_id(slug).await
        })
        .await
        .map_err(ProvisionError::Finalize)?;

        match page {
            Some(id) => {
                wp.update_option("page_on_front", &id)
                    .await
                    .map_err(ProvisionError::Finalize)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn disclose_credential(&self, store_id: &str, login: AdminLogin<'_>) {
        let message = if self.demo_mode {
            format!("Admin Password: {}", login.credential)
        } else if login.stored {
            format!(
                "Admin password stored in secret {} (namespace {store_id})",
                secret_name(store_id)
            )
        } else {
            "Admin password could not be stored; reset it from the store admin".to_string()
        };
        self.events.warning(message, Some(store_id));
    }
}
