//! Typed wrapper over the package-deployment CLI.

use super::command::{CommandError, CommandRunner};
use crate::model::Release;
use std::path::PathBuf;
use std::sync::Arc;

const HELM: &str = "helm";

/// The chart every store is deployed from, plus its values overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSource {
    pub chart_path: PathBuf,
    pub values_path: PathBuf,
}

/// Release operations keyed by store id (release name == namespace).
#[derive(Clone)]
pub struct Helm {
    runner: Arc<dyn CommandRunner>,
    chart: ChartSource,
}

impl Helm {
    pub fn new(runner: Arc<dyn CommandRunner>, chart: ChartSource) -> Self {
        Self { runner, chart }
    }

    async fn helm(&self, args: Vec<String>) -> Result<String, CommandError> {
        self.runner.run(HELM, &args).await
    }

    fn chart_args(&self) -> [String; 3] {
        [
            self.chart.chart_path.display().to_string(),
            "-f".to_string(),
            self.chart.values_path.display().to_string(),
        ]
    }

    /// Installs a new release into a freshly created namespace of the same name.
    pub async fn install(&self, release: &str) -> Result<(), CommandError> {
        let mut args = vec!["install".to_string(), release.to_string()];
        args.extend(self.chart_args());
        args.extend([
            "--create-namespace".to_string(),
            "--namespace".to_string(),
            release.to_string(),
        ]);
        self.helm(args).await.map(|_| ())
    }

    /// Upgrades an existing release in place (new revision, same name and namespace).
    pub async fn upgrade(&self, release: &str) -> Result<(), CommandError> {
        let mut args = vec!["upgrade".to_string(), release.to_string()];
        args.extend(self.chart_args());
        args.extend(["--namespace".to_string(), release.to_string()]);
        self.helm(args).await.map(|_| ())
    }

    /// Reverts a release. Revision `0` asks Helm for the previous revision.
    pub async fn rollback(&self, release: &str, revision: u32) -> Result<(), CommandError> {
        self.helm(vec![
            "rollback".to_string(),
            release.to_string(),
            revision.to_string(),
            "--namespace".to_string(),
            release.to_string(),
        ])
        .await
        .map(|_| ())
    }

    pub async fn uninstall(&self, release: &str) -> Result<(), CommandError> {
        self.helm(vec![
            "uninstall".to_string(),
            release.to_string(),
            "--namespace".to_string(),
            release.to_string(),
        ])
        .await
        .map(|_| ())
    }

    /// All releases in all namespaces.
    pub async fn list(&self) -> Result<Vec<Release>, CommandError> {
        let raw = self
            .helm(vec![
                "list".to_string(),
                "-A".to_string(),
                "-o".to_string(),
                "json".to_string(),
            ])
            .await?;

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|e| CommandError::Parse {
            command: format!("{HELM} list -A -o json"),
            message: e.to_string(),
        })
    }
}
