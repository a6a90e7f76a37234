//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid order parameters: {0}")]
    Order(#[from] tradesim_core::CoreError),

    #[error("Feed lost after {attempts} reopen attempts: {reason}")]
    FeedLost { attempts: u32, reason: String },
}

pub type AppResult<T> = Result<T, AppError>;
