//! Crate-level error type.
//!
//! Each concern keeps its own error enum (`StoreError`, `NarrativeError`,
//! `ValidationErrors`); [`Error`] wraps them for the command layer.

use crate::narrative::NarrativeError;
use crate::storage::StoreError;
use crate::validation::ValidationErrors;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Narrative(#[from] NarrativeError),

    #[error("Task {0} not found.")]
    TaskNotFound(String),

    #[error("Id prefix '{0}' matches more than one task.")]
    AmbiguousId(String),

    #[error("Step {position} not found on task {task}.")]
    StepNotFound { task: String, position: usize },

    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
