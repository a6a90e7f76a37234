//! WebSocket message types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Order-book channel name on the venue.
pub const BOOKS_CHANNEL: &str = "books";

/// Subscription control message.
///
/// Serializes as `{"op":"subscribe","args":[{"channel":"books","instId":"BTC-USDT-SWAP"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    pub op: String,
    pub args: Vec<SubscriptionArg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionArg {
    pub channel: String,
    #[serde(rename = "instId")]
    pub inst_id: String,
}

impl SubscribeRequest {
    /// Create an order-book subscription for one instrument.
    pub fn books(inst_id: impl Into<String>) -> Self {
        Self {
            op: "subscribe".to_string(),
            args: vec![SubscriptionArg {
                channel: BOOKS_CHANNEL.to_string(),
                inst_id: inst_id.into(),
            }],
        }
    }
}

/// Undecoded text payload as received from the transport.
///
/// Cheap to clone; the payload is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    text: Arc<str>,
    received_at: DateTime<Utc>,
}

impl RawMessage {
    /// Wrap a payload stamped with the current time.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self::with_received_at(text, Utc::now())
    }

    pub fn with_received_at(text: impl Into<Arc<str>>, received_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            received_at,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}
