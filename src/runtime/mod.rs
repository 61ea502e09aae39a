//! Runtime wiring and lifecycle management.
//!
//! - [`StoreSystem`] builds the event log, the cluster wrappers, the lifecycle
//!   controller and the admission queue, and shuts them down in order.
//! - [`setup_tracing`] initializes the diagnostic channel.

pub mod store_system;
pub mod tracing;

pub use store_system::*;
pub use tracing::*;
