//! Error types for tradesim-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Empty book side: {0}")]
    EmptySide(&'static str),

    #[error("Invalid order parameters: {0}")]
    InvalidOrder(String),

    #[error("Unknown order type: {0}")]
    UnknownOrderType(String),

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
