//! Process execution seam for the external command-line collaborators.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors produced while running an external command.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    /// The program could not be started (missing binary, permissions, ...).
    #[error("failed to launch `{command}`: {message}")]
    Spawn { command: String, message: String },

    /// The program ran and exited unsuccessfully.
    #[error("`{command}` exited with status {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The program succeeded but its output could not be interpreted.
    #[error("unexpected output from `{command}`: {message}")]
    Parse { command: String, message: String },
}

impl CommandError {
    pub fn command(&self) -> &str {
        match self {
            CommandError::Spawn { command, .. }
            | CommandError::Failed { command, .. }
            | CommandError::Parse { command, .. } => command,
        }
    }
}

/// Runs an external program and returns its standard output.
///
/// Production code uses [`ProcessRunner`]; tests script responses with
/// [`ScriptedRunner`](crate::cluster::mock::ScriptedRunner).
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError>;
}

/// Renders a program and its arguments the way it would be typed in a shell.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Spawns real processes with `tokio::process`.
///
/// Arguments are passed as a vector, never through a shell.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(working_dir.into()),
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        let rendered = command_line(program, args);
        debug!(command = %rendered, "Running");

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| CommandError::Spawn {
            command: rendered.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                command: rendered,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_command_line() {
        let args = vec!["get".to_string(), "pods".to_string()];
        assert_eq!(command_line("kubectl", &args), "kubectl get pods");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let runner = ProcessRunner::default();
        let err = runner
            .run("definitely-not-a-real-binary-4242", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
