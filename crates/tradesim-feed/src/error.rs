//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Message has neither bids nor asks")]
    NotABook,

    #[error("Missing {0} side")]
    MissingSide(&'static str),

    #[error("Invalid level: {0}")]
    InvalidLevel(String),

    #[error("Empty book: {0}")]
    EmptyBook(#[from] tradesim_core::CoreError),
}

pub type FeedResult<T> = Result<T, FeedError>;
