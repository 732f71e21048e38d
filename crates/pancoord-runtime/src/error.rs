//! Runtime error types

use pancoord_core::CoordError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The worker stopped before answering
    #[error("Coordinator task is not running")]
    TaskStopped,

    #[error("Coordinator task panicked: {0}")]
    TaskPanicked(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
