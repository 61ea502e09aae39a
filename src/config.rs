//! Runtime configuration.
//!
//! Process-level settings come from the command line with environment-variable
//! fallbacks ([`OrchestratorConfig`]). What a store looks like inside the cluster
//! ([`StoreProfile`]) and how long each phase may wait ([`PhaseTimings`]) are code
//! defaults that tests override.

use crate::cluster::ChartSource;
use crate::controller::PollPolicy;
use crate::queue::AdmissionLimits;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line and environment configuration of the orchestrator process.
#[derive(Debug, Clone, Parser)]
#[command(name = "store-orchestrator", version, about = "Provisions isolated e-commerce stores on a cluster")]
pub struct OrchestratorConfig {
    /// Address the HTTP API binds to.
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Working directory for external commands and default chart lookup.
    #[arg(long, env = "WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Store chart. Defaults to `<work_dir>/urumi-platform/woocommerce-store`.
    #[arg(long, env = "CHART_PATH")]
    pub chart_path: Option<PathBuf>,

    /// Values overlay. Defaults to `<work_dir>/values-gcp.yaml`.
    #[arg(long, env = "VALUES_PATH")]
    pub values_path: Option<PathBuf>,

    /// Append-only JSONL audit file.
    #[arg(long, env = "AUDIT_FILE", default_value = "audit.log")]
    pub audit_file: PathBuf,

    /// Static dashboard served for non-API paths.
    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,

    #[arg(long, env = "MAX_STORES_TOTAL", default_value_t = 5)]
    pub max_stores_total: usize,

    #[arg(long, env = "MAX_CONCURRENT", default_value_t = 2)]
    pub max_concurrent: usize,

    /// Publish generated admin passwords in the event log.
    #[arg(long, env = "DEMO_MODE", default_value_t = false)]
    pub demo_mode: bool,

    /// Let the same store id be queued while it is already pending.
    #[arg(long, env = "ALLOW_DUPLICATE_TASKS", default_value_t = false)]
    pub allow_duplicate_tasks: bool,
}

impl OrchestratorConfig {
    pub fn chart_source(&self) -> ChartSource {
        ChartSource {
            chart_path: self
                .chart_path
                .clone()
                .unwrap_or_else(|| self.work_dir.join("urumi-platform").join("woocommerce-store")),
            values_path: self
                .values_path
                .clone()
                .unwrap_or_else(|| self.work_dir.join("values-gcp.yaml")),
        }
    }

    pub fn limits(&self) -> AdmissionLimits {
        AdmissionLimits {
            max_concurrent: self.max_concurrent.max(1),
            max_stores_total: self.max_stores_total,
            allow_duplicates: self.allow_duplicate_tasks,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind_address, self.port).parse()
    }
}

/// Database settings the store chart provisions next to WordPress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseProfile {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
}

/// What a deployed store looks like from the orchestrator's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreProfile {
    /// Load-balanced service that receives the public address.
    pub service_name: String,
    /// Container the `wp` commands run in.
    pub container: String,
    pub database: DatabaseProfile,
    pub admin_email: String,
    pub commerce_plugin: String,
    pub theme: String,
    pub sample_product_name: String,
    pub sample_product_price: String,
    /// Slug of the page set as the static front page.
    pub front_page_slug: String,
}

impl Default for StoreProfile {
    fn default() -> Self {
        Self {
            service_name: "gcp-shop-svc".to_string(),
            container: "wordpress".to_string(),
            database: DatabaseProfile {
                name: "wordpress".to_string(),
                user: "wp_user".to_string(),
                password: "wp_password".to_string(),
                host: "127.0.0.1".to_string(),
            },
            admin_email: "admin@example.com".to_string(),
            commerce_plugin: "woocommerce".to_string(),
            theme: "storefront".to_string(),
            sample_product_name: "Cloud Sneakers".to_string(),
            sample_product_price: "99".to_string(),
            front_page_slug: "shop".to_string(),
        }
    }
}

/// Time budgets of the lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    pub pod_ready_timeout: Duration,
    pub public_address: PollPolicy,
    /// An INFO progress event is emitted every this many address attempts.
    pub address_progress_every: u32,
    /// Pause before the first database configuration attempt.
    pub settle_delay: Duration,
    pub database: PollPolicy,
    pub front_page: PollPolicy,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            pod_ready_timeout: Duration::from_secs(300),
            public_address: PollPolicy::new(Duration::from_secs(5), 100),
            address_progress_every: 5,
            settle_delay: Duration::from_secs(20),
            database: PollPolicy::new(Duration::from_secs(5), 10),
            front_page: PollPolicy::new(Duration::from_secs(5), 10),
        }
    }
}

impl PhaseTimings {
    /// Same attempt budgets, no waiting. For tests.
    pub fn immediate() -> Self {
        let defaults = Self::default();
        Self {
            public_address: defaults.public_address.with_interval(Duration::ZERO),
            settle_delay: Duration::ZERO,
            database: defaults.database.with_interval(Duration::ZERO),
            front_page: defaults.front_page.with_interval(Duration::ZERO),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_paths_default_under_work_dir() {
        let config = OrchestratorConfig::parse_from(["store-orchestrator", "--work-dir", "/srv/orchestrator"]);
        let chart = config.chart_source();
        assert_eq!(
            chart.chart_path,
            PathBuf::from("/srv/orchestrator/urumi-platform/woocommerce-store")
        );
        assert_eq!(chart.values_path, PathBuf::from("/srv/orchestrator/values-gcp.yaml"));
    }

    #[test]
    fn explicit_chart_path_wins() {
        let config = OrchestratorConfig::parse_from([
            "store-orchestrator",
            "--chart-path",
            "/charts/store",
            "--max-concurrent",
            "0",
        ]);
        assert_eq!(config.chart_source().chart_path, PathBuf::from("/charts/store"));
        assert_eq!(config.limits().max_concurrent, 1);
    }

    #[test]
    fn immediate_timings_keep_attempt_budgets() {
        let timings = PhaseTimings::immediate();
        assert_eq!(timings.public_address.max_attempts, 100);
        assert_eq!(timings.database.max_attempts, 10);
        assert_eq!(timings.settle_delay, Duration::ZERO);
    }
}
