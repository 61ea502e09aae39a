//! Typed wrapper over the cluster control-plane CLI.

use super::command::{CommandError, CommandRunner};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const KUBECTL: &str = "kubectl";

/// Namespace-scoped `kubectl` operations.
#[derive(Clone)]
pub struct Kubectl {
    runner: Arc<dyn CommandRunner>,
    staging_dir: PathBuf,
}

impl Kubectl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            staging_dir: std::env::temp_dir(),
        }
    }

    /// Directory in which manifests are staged before `kubectl apply -f`.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    async fn kubectl<I, S>(&self, args: I) -> Result<String, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.runner.run(KUBECTL, &args).await
    }

    pub async fn apply_file(&self, path: &Path) -> Result<(), CommandError> {
        self.kubectl(["apply".to_string(), "-f".to_string(), path.display().to_string()])
            .await
            .map(|_| ())
    }

    /// Stages `manifest` in a temporary file named after `name`, applies it, and
    /// removes the file whatever the outcome.
    pub async fn apply_manifest(&self, name: &str, manifest: &str) -> Result<(), CommandError> {
        let staged = tempfile::Builder::new()
            .prefix(&format!("{name}_"))
            .suffix(".yaml")
            .tempfile_in(&self.staging_dir)
            .and_then(|mut file| {
                file.write_all(manifest.as_bytes())?;
                file.flush()?;
                Ok(file)
            })
            .map_err(|e| CommandError::Spawn {
                command: format!("{KUBECTL} apply ({name})"),
                message: format!("could not stage manifest: {e}"),
            })?;

        debug!(path = %staged.path().display(), "Staged manifest");
        let result = self.apply_file(staged.path()).await;

        if let Err(e) = staged.close() {
            debug!(error = %e, "Staged manifest already removed");
        }
        result
    }

    /// Blocks until every pod in `namespace` is ready, bounded by `timeout`.
    pub async fn wait_pods_ready(&self, namespace: &str, timeout: Duration) -> Result<(), CommandError> {
        self.kubectl([
            "wait".to_string(),
            "--for=condition=ready".to_string(),
            "pod".to_string(),
            "--all".to_string(),
            "-n".to_string(),
            namespace.to_string(),
            format!("--timeout={}s", timeout.as_secs()),
        ])
        .await
        .map(|_| ())
    }

    pub async fn pod_names(&self, namespace: &str) -> Result<Vec<String>, CommandError> {
        let raw = self
            .kubectl([
                "get",
                "pods",
                "-n",
                namespace,
                "--no-headers",
                "-o",
                "custom-columns=:metadata.name",
            ])
            .await?;

        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// The first externally assigned ingress IP of `service`, if any.
    pub async fn service_ingress_ip(
        &self,
        namespace: &str,
        service: &str,
    ) -> Result<Option<String>, CommandError> {
        let raw = self
            .kubectl(["get", "svc", "-n", namespace, service, "-o", "json"])
            .await?;

        let json: Value = serde_json::from_str(&raw).map_err(|e| CommandError::Parse {
            command: format!("{KUBECTL} get svc -n {namespace} {service}"),
            message: e.to_string(),
        })?;

        Ok(ingress_ip(&json))
    }

    /// Runs `command` inside `container` of `pod`.
    pub async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<String, CommandError> {
        let mut args: Vec<String> = ["exec", "-n", namespace, pod, "-c", container, "--"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        args.extend(command.iter().cloned());
        self.runner.run(KUBECTL, &args).await
    }

    pub async fn delete_namespace(&self, namespace: &str) -> Result<(), CommandError> {
        self.kubectl(["delete", "namespace", namespace]).await.map(|_| ())
    }

    pub async fn delete_pvcs(&self, namespace: &str) -> Result<(), CommandError> {
        self.kubectl(["delete", "pvc", "--all", "-n", namespace])
            .await
            .map(|_| ())
    }

    pub async fn label_namespace(&self, namespace: &str, key: &str, value: &str) -> Result<(), CommandError> {
        self.kubectl([
            "label".to_string(),
            "namespace".to_string(),
            namespace.to_string(),
            format!("{key}={value}"),
            "--overwrite".to_string(),
        ])
        .await
        .map(|_| ())
    }
}

fn ingress_ip(service: &Value) -> Option<String> {
    service
        .pointer("/status/loadBalancer/ingress/0/ip")
        .and_then(Value::as_str)
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::mock::ScriptedRunner;

    #[test]
    fn extracts_first_ingress_ip() {
        let svc: Value = serde_json::from_str(
            r#"{"status":{"loadBalancer":{"ingress":[{"ip":"34.1.2.3"},{"ip":"10.0.0.1"}]}}}"#,
        )
        .unwrap();
        assert_eq!(ingress_ip(&svc).as_deref(), Some("34.1.2.3"));

        let pending: Value = serde_json::from_str(r#"{"status":{"loadBalancer":{}}}"#).unwrap();
        assert_eq!(ingress_ip(&pending), None);
    }

    #[tokio::test]
    async fn staged_manifest_is_removed_after_failed_apply() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::strict();
        runner.expect("kubectl apply").return_err("forbidden");
        let kubectl = Kubectl::new(Arc::new(runner.clone())).with_staging_dir(dir.path());

        let result = kubectl.apply_manifest("secret_shop", "kind: Secret\n").await;

        assert!(result.is_err());
        assert_eq!(runner.count("kubectl apply -f"), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn pod_names_skip_blank_lines() {
        let runner = ScriptedRunner::strict();
        runner.expect("get pods").return_ok("shop-wp-0\n\nshop-db-0\n");
        let kubectl = Kubectl::new(Arc::new(runner));

        let pods = kubectl.pod_names("shop").await.unwrap();
        assert_eq!(pods, vec!["shop-wp-0", "shop-db-0"]);
    }
}
