//! # Store Orchestrator
//!
//! > **Self-service provisioning of isolated e-commerce stores on a Kubernetes cluster.**
//!
//! Each store is a Helm release of a WordPress + WooCommerce chart living in its own
//! namespace. The orchestrator queues creation requests, drives every store through a
//! fixed sequence of phases (deploy, harden, wait, bootstrap content, finalize), and
//! keeps an operator-facing event log with a durable audit trail.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Commands at the edge, decisions in the middle
//! Everything that touches the cluster goes through one seam: the
//! [`CommandRunner`](cluster::CommandRunner) trait. The typed wrappers
//! ([`Helm`](cluster::Helm), [`Kubectl`](cluster::Kubectl),
//! [`ContentTool`](cluster::ContentTool)) build argument vectors, never shell strings,
//! and the lifecycle logic above them never sees a process.
//! -   **Benefit**: The whole lifecycle runs in tests against
//!     [`ScriptedRunner`](cluster::mock::ScriptedRunner) with no cluster at all.
//!
//! ### One owner for queue state
//! The admission queue is an actor. A single task owns the pending tasks and the
//! counters; everyone else holds a [`QueueClient`](queue::QueueClient). No lock guards
//! the queue, and admission decisions are serialized by construction.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Failure classes
//! [`ProvisionError`](error::ProvisionError) tags every failure with a
//! [`FailureClass`](error::FailureClass): fatal to the task, degraded (the store is
//! still reported ready), or rejected at admission. Only fatal failures stop a run.
//!
//! ### 2. Bounded waits
//! Every wait in the lifecycle is a [`poll`](controller::poll()) driven by a
//! [`PhaseTimings`](config::PhaseTimings) value. Production budgets are minutes;
//! [`PhaseTimings::immediate`](config::PhaseTimings::immediate) makes tests instant.
//!
//! ### 3. Observability
//! Two channels: the [`EventLog`](events::EventLog) for operators (bounded, served over
//! HTTP, appended to `audit.log`) and `tracing` for developers. Every event log entry
//! is mirrored to `tracing` as well.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Edge ([`cluster`])
//! - **Role**: Run `helm`, `kubectl` and in-pod `wp` commands and parse their output.
//! - **Key items**: [`CommandRunner`](cluster::CommandRunner), [`Helm`](cluster::Helm),
//!   [`Kubectl`](cluster::Kubectl).
//!
//! ### 2. The Lifecycle ([`controller`], [`hardening`], [`secrets`])
//! - **Role**: Provision, upgrade and roll back a single store.
//! - **Key items**: [`LifecycleController`](controller::LifecycleController).
//!
//! ### 3. Admission ([`queue`])
//! - **Role**: FIFO queue, concurrency cap, global store quota, duplicate detection.
//! - **Key items**: [`AdmissionQueue`](queue::AdmissionQueue), [`QueueClient`](queue::QueueClient).
//!
//! ### 4. The Surface ([`service`], [`api`])
//! - **Role**: Store operations and their HTTP routes.
//!
//! ### 5. Wiring ([`runtime`], [`config`])
//! - **Role**: Configuration, start-up and ordered shutdown.
//! - **Key items**: [`StoreSystem`](runtime::StoreSystem), [`OrchestratorConfig`](config::OrchestratorConfig).
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! RUST_LOG=info cargo run -- --work-dir /srv/orchestrator --port 3000
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod api;
pub mod cluster;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod hardening;
pub mod model;
pub mod queue;
pub mod runtime;
pub mod secrets;
pub mod service;
