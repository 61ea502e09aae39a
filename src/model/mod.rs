//! Pure data structures (DTOs) shared by the queue, the controller and the HTTP layer.

pub mod event;
pub mod release;
pub mod task;

pub use event::*;
pub use release::*;
pub use task::*;
