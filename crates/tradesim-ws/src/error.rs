//! WebSocket error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Connect timed out after {0}ms")]
    ConnectTimeout(u64),

    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("Feed already opened")]
    AlreadyOpen,

    #[error("Feed closed")]
    Closed,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WsResult<T> = Result<T, WsError>;
