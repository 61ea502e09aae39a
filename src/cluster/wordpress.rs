//! Content-management commands (`wp`) run inside a store's workload container.

use super::command::CommandError;
use super::kubectl::Kubectl;
use crate::config::StoreProfile;

const WP_CLI_INSTALL: &str = "curl -O https://raw.githubusercontent.com/wp-cli/builds/gh-pages/phar/wp-cli.phar \
&& chmod +x wp-cli.phar && mv wp-cli.phar /usr/local/bin/wp";

/// `wp` bound to one pod of one store.
pub struct ContentTool<'a> {
    kubectl: &'a Kubectl,
    profile: &'a StoreProfile,
    namespace: &'a str,
    pod: String,
}

impl<'a> ContentTool<'a> {
    pub fn new(kubectl: &'a Kubectl, profile: &'a StoreProfile, namespace: &'a str, pod: impl Into<String>) -> Self {
        Self {
            kubectl,
            profile,
            namespace,
            pod: pod.into(),
        }
    }

    pub fn pod(&self) -> &str {
        &self.pod
    }

    async fn exec(&self, command: Vec<String>) -> Result<String, CommandError> {
        self.kubectl
            .exec(self.namespace, &self.pod, &self.profile.container, &command)
            .await
    }

    async fn wp<I, S>(&self, args: I) -> Result<String, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command = vec!["wp".to_string()];
        command.extend(args.into_iter().map(Into::into));
        command.push("--allow-root".to_string());
        self.exec(command).await
    }

    /// Downloads the `wp` binary into the container. May fail when it is already present.
    pub async fn install_cli(&self) -> Result<(), CommandError> {
        self.exec(vec![
            "/bin/bash".to_string(),
            "-c".to_string(),
            WP_CLI_INSTALL.to_string(),
        ])
        .await
        .map(|_| ())
    }

    /// Writes `wp-config.php`. Fails while the database is not accepting connections.
    pub async fn configure_database(&self) -> Result<(), CommandError> {
        let db = &self.profile.database;
        self.wp([
            "config".to_string(),
            "create".to_string(),
            format!("--dbname={}", db.name),
            format!("--dbuser={}", db.user),
            format!("--dbpass={}", db.password),
            format!("--dbhost={}", db.host),
            "--force".to_string(),
        ])
        .await
        .map(|_| ())
    }

    /// Any failure of `wp core is-installed` counts as not installed.
    pub async fn is_installed(&self) -> bool {
        self.wp(["core", "is-installed"]).await.is_ok()
    }

    pub async fn install_core(&self, url: &str, title: &str, admin_password: &str) -> Result<(), CommandError> {
        self.wp([
            "core".to_string(),
            "install".to_string(),
            format!("--url={url}"),
            format!("--title={title}"),
            "--admin_user=admin".to_string(),
            format!("--admin_password={admin_password}"),
            format!("--admin_email={}", self.profile.admin_email),
            "--skip-email".to_string(),
        ])
        .await
        .map(|_| ())
    }

    pub async fn install_plugin(&self, plugin: &str) -> Result<(), CommandError> {
        self.wp(["plugin", "install", plugin, "--activate"]).await.map(|_| ())
    }

    pub async fn install_theme(&self, theme: &str) -> Result<(), CommandError> {
        self.wp(["theme", "install", theme, "--activate"]).await.map(|_| ())
    }

    pub async fn update_option(&self, key: &str, value: &str) -> Result<(), CommandError> {
        self.wp(["option", "update", key, value]).await.map(|_| ())
    }

    /// Runs a WooCommerce maintenance tool such as `install_pages`.
    pub async fn run_commerce_tool(&self, tool: &str) -> Result<(), CommandError> {
        self.wp(["wc", "tool", "run", tool, "--user=admin"])
            .await
            .map(|_| ())
    }

    pub async fn create_product(&self, name: &str, price: &str) -> Result<(), CommandError> {
        self.wp([
            "wc".to_string(),
            "product".to_string(),
            "create".to_string(),
            format!("--name={name}"),
            "--type=simple".to_string(),
            format!("--regular_price={price}"),
            "--user=admin".to_string(),
        ])
        .await
        .map(|_| ())
    }

    /// Id of the page with slug `slug`, or `None` while it does not exist yet.
    pub async fn page_id(&self, slug: &str) -> Result<Option<String>, CommandError> {
        let raw = self
            .wp([
                "post".to_string(),
                "list".to_string(),
                "--post_type=page".to_string(),
                format!("--name={slug}"),
                "--field=ID".to_string(),
            ])
            .await?;

        Ok(raw.lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::mock::ScriptedRunner;
    use std::sync::Arc;

    #[tokio::test]
    async fn wp_commands_run_as_root_in_store_container() {
        let runner = ScriptedRunner::strict();
        runner.expect("wp option update").return_ok("");
        let kubectl = Kubectl::new(Arc::new(runner.clone()));
        let profile = StoreProfile::default();
        let tool = ContentTool::new(&kubectl, &profile, "shop", "shop-wp-0");

        tool.update_option("show_on_front", "page").await.unwrap();

        assert_eq!(
            runner.calls(),
            vec!["kubectl exec -n shop shop-wp-0 -c wordpress -- wp option update show_on_front page --allow-root"]
        );
    }

    #[tokio::test]
    async fn page_id_is_none_for_empty_output() {
        let runner = ScriptedRunner::strict();
        runner.expect("wp post list").return_sequence(["\n", "42\n"]);
        let kubectl = Kubectl::new(Arc::new(runner));
        let profile = StoreProfile::default();
        let tool = ContentTool::new(&kubectl, &profile, "shop", "pod");

        assert_eq!(tool.page_id("shop").await.unwrap(), None);
        assert_eq!(tool.page_id("shop").await.unwrap().as_deref(), Some("42"));
    }
}
