/// Errors talking to the admission queue actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Admission queue closed")]
    Closed,
    #[error("Admission queue dropped response channel")]
    Dropped,
}
