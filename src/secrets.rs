//! Per-store admin credentials.
//!
//! A credential is generated once per provisioning run and materialized as an
//! `Opaque` secret named `<store>-admin-creds` inside the store's namespace. The
//! same value is handed to the content bootstrap as the WordPress admin password.

use crate::cluster::Kubectl;
use crate::error::ProvisionError;
use crate::events::EventLog;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::instrument;

/// Length of generated credentials.
pub const CREDENTIAL_LEN: usize = 16;

/// A fresh random alphanumeric credential.
pub fn generate_credential() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CREDENTIAL_LEN)
        .map(char::from)
        .collect()
}

/// Name of the secret object holding a store's admin credential.
pub fn secret_name(store_id: &str) -> String {
    format!("{store_id}-admin-creds")
}

pub fn render_secret_manifest(store_id: &str, credential: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Secret
metadata:
  name: {name}
  namespace: {store_id}
type: Opaque
stringData:
  username: admin
  password: "{credential}"
"#,
        name = secret_name(store_id),
    )
}

/// Materializes credentials as cluster secrets.
#[derive(Clone)]
pub struct SecretProvisioner {
    kubectl: Kubectl,
    events: Arc<EventLog>,
}

impl SecretProvisioner {
    pub fn new(kubectl: Kubectl, events: Arc<EventLog>) -> Self {
        Self { kubectl, events }
    }

    /// Applies the secret. Failures are recorded as ERROR and returned; callers may
    /// carry on without it.
    #[instrument(skip(self, credential))]
    pub async fn provision_credential(&self, store_id: &str, credential: &str) -> Result<(), ProvisionError> {
        let manifest = render_secret_manifest(store_id, credential);

        match self
            .kubectl
            .apply_manifest(&format!("secret_{store_id}"), &manifest)
            .await
        {
            Ok(()) => {
                self.events.success(
                    format!("Secure Admin Secret created: {}", secret_name(store_id)),
                    Some(store_id),
                );
                Ok(())
            }
            Err(e) => {
                self.events
                    .error(format!("Secret creation failed: {e}"), Some(store_id));
                Err(ProvisionError::Credential(e))
            }
        }
    }
}
