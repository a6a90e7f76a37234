//! Order-book WebSocket feed for tradesim.
//!
//! Provides a single-subscription feed connection with:
//! - Subscription handshake sent before any data is yielded
//! - Lazy, non-restartable message stream
//! - Idempotent, cooperative close
//! - Bounded drop-oldest handoff to the consumer task
//!
//! Reconnection is the caller's job.

pub mod connection;
pub mod error;
pub mod handoff;
pub mod message;

pub use connection::{ConnectionState, FeedConfig, FeedConnection, FeedStream};
pub use error::{WsError, WsResult};
pub use handoff::{effective_capacity, handoff_channel, spawn_feed_task, FeedEvent, HandoffReceiver, HandoffSender};
pub use message::{RawMessage, SubscribeRequest, SubscriptionArg};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Install the rustls ring provider used for `wss://` feeds.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
