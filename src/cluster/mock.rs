//! # Scripted Command Runner
//!
//! Utilities for testing the controller and the service without a cluster.
//!
//! [`ScriptedRunner`] implements [`CommandRunner`] entirely in memory. Responses are
//! registered per command pattern with a fluent builder, and every invocation is
//! recorded so tests can assert on ordering.
//!
//! ```ignore
//! let runner = ScriptedRunner::permissive();
//! runner.expect("helm install").return_ok("");
//! runner.expect("wp config create").fail_times(3, "");
//!
//! let kubectl = Kubectl::new(Arc::new(runner.clone()));
//! // ... drive the code under test ...
//! assert!(runner.position("helm install") < runner.position("kubectl wait"));
//! ```
//!
//! ## Matching
//!
//! A pattern matches when it is a substring of the rendered command line
//! (`kubectl exec -n shop pod-0 -c wordpress -- wp core is-installed --allow-root`).
//! When several patterns match, the longest wins. A pattern's responses are consumed
//! in order and the last one repeats forever.
//!
//! ## Unmatched commands
//!
//! A [`strict`](ScriptedRunner::strict) runner fails every unmatched command; a
//! [`permissive`](ScriptedRunner::permissive) runner answers them with empty output.

use super::command::{command_line, CommandError, CommandRunner};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
enum Scripted {
    Ok(String),
    Fail(String),
}

struct Rule {
    pattern: String,
    responses: VecDeque<Scripted>,
}

/// An in-memory [`CommandRunner`] with scripted responses.
#[derive(Clone)]
pub struct ScriptedRunner {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<String>>>,
    strict: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedRunner {
    /// Unmatched commands fail.
    pub fn strict() -> Self {
        Self::build(true)
    }

    /// Unmatched commands succeed with empty output.
    pub fn permissive() -> Self {
        Self::build(false)
    }

    fn build(strict: bool) -> Self {
        Self {
            rules: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            strict,
        }
    }

    /// Starts an expectation for commands containing `pattern`.
    pub fn expect(&self, pattern: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            pattern: pattern.into(),
            rules: self.rules.clone(),
        }
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of recorded commands containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }

    /// Index of the first recorded command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        lock(&self.calls).iter().position(|c| c.contains(pattern))
    }

    fn respond(&self, line: &str) -> Option<Scripted> {
        let mut rules = lock(&self.rules);
        let rule = rules
            .iter_mut()
            .filter(|r| line.contains(&r.pattern))
            .max_by_key(|r| r.pattern.len())?;

        if rule.responses.len() > 1 {
            rule.responses.pop_front()
        } else {
            rule.responses.front().cloned()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        let line = command_line(program, args);
        lock(&self.calls).push(line.clone());

        match self.respond(&line) {
            Some(Scripted::Ok(stdout)) => Ok(stdout),
            Some(Scripted::Fail(stderr)) => Err(CommandError::Failed {
                command: line,
                code: Some(1),
                stderr,
            }),
            None if self.strict => Err(CommandError::Failed {
                command: line,
                code: None,
                stderr: "unexpected command".to_string(),
            }),
            None => Ok(String::new()),
        }
    }
}

/// Builder returned by [`ScriptedRunner::expect`].
pub struct ExpectationBuilder {
    pattern: String,
    rules: Arc<Mutex<Vec<Rule>>>,
}

impl ExpectationBuilder {
    /// Matching commands succeed with `stdout`.
    pub fn return_ok(self, stdout: impl Into<String>) {
        self.push(vec![Scripted::Ok(stdout.into())]);
    }

    /// Matching commands exit unsuccessfully with `stderr`.
    pub fn return_err(self, stderr: impl Into<String>) {
        self.push(vec![Scripted::Fail(stderr.into())]);
    }

    /// The first `failures` matching commands fail, later ones succeed with `stdout`.
    pub fn fail_times(self, failures: usize, stdout: impl Into<String>) {
        let mut responses: Vec<Scripted> = (0..failures)
            .map(|i| Scripted::Fail(format!("scripted failure {}", i + 1)))
            .collect();
        responses.push(Scripted::Ok(stdout.into()));
        self.push(responses);
    }

    /// Matching commands succeed with each of `outputs` in turn; the last repeats.
    pub fn return_sequence<I, S>(self, outputs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let responses: Vec<Scripted> = outputs
            .into_iter()
            .map(|s| Scripted::Ok(s.into()))
            .collect();
        self.push(responses);
    }

    fn push(self, responses: Vec<Scripted>) {
        if responses.is_empty() {
            return;
        }
        let mut rules = lock(&self.rules);
        // Re-scripting a pattern replaces its previous responses.
        rules.retain(|r| r.pattern != self.pattern);
        rules.push(Rule {
            pattern: self.pattern,
            responses: responses.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn longest_pattern_wins_and_last_response_repeats() {
        let runner = ScriptedRunner::strict();
        runner.expect("kubectl").return_ok("generic");
        runner.expect("kubectl get svc").return_sequence(["first", "second"]);

        let svc = args(&["get", "svc"]);
        assert_eq!(runner.run("kubectl", &svc).await.unwrap(), "first");
        assert_eq!(runner.run("kubectl", &svc).await.unwrap(), "second");
        assert_eq!(runner.run("kubectl", &svc).await.unwrap(), "second");
        assert_eq!(
            runner.run("kubectl", &args(&["wait"])).await.unwrap(),
            "generic"
        );
        assert_eq!(runner.count("get svc"), 3);
    }

    #[tokio::test]
    async fn strict_rejects_unmatched_commands() {
        let runner = ScriptedRunner::strict();
        let err = runner.run("helm", &args(&["list"])).await.unwrap_err();
        assert_eq!(err.command(), "helm list");

        let permissive = ScriptedRunner::permissive();
        assert_eq!(permissive.run("helm", &args(&["list"])).await.unwrap(), "");
    }

    #[tokio::test]
    async fn fail_times_then_succeeds() {
        let runner = ScriptedRunner::strict();
        runner.expect("wp config").fail_times(2, "ok");

        let cmd = args(&["config", "create"]);
        assert!(runner.run("wp", &cmd).await.is_err());
        assert!(runner.run("wp", &cmd).await.is_err());
        assert_eq!(runner.run("wp", &cmd).await.unwrap(), "ok");
    }
}
