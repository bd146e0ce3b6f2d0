//! Core domain errors.

use thiserror::Error;

/// Core domain errors for the broker.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A routing category field was missing or empty.
    #[error("Invalid worker category: {0}")]
    InvalidCategory(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
