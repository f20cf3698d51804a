// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Unknown image format: {0}")]
    UnknownImageFormat(String),

    #[error("Session id must be {expected} characters, got {actual}")]
    InvalidSessionId { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, DomainError>;
