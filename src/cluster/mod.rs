//! External command-line collaborators.
//!
//! The orchestrator never talks to the cluster directly. Every operation goes through
//! one of three CLIs, each wrapped in a typed facade:
//!
//! - [`Kubectl`] - control plane (apply, wait, get, exec, delete, label)
//! - [`Helm`] - package deployment (install, upgrade, rollback, uninstall, list)
//! - [`ContentTool`] - `wp` executed inside a store's workload container
//!
//! All of them share one [`CommandRunner`], which is the seam tests replace with a
//! [`ScriptedRunner`](mock::ScriptedRunner).

pub mod command;
pub mod helm;
pub mod kubectl;
pub mod mock;
pub mod wordpress;

pub use command::{CommandError, CommandRunner, ProcessRunner};
pub use helm::{ChartSource, Helm};
pub use kubectl::Kubectl;
pub use wordpress::ContentTool;
