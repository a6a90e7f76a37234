//! Order-book feed connection.
//!
//! Owns exactly one logical subscription: connect, send the subscription
//! handshake, then yield raw messages until the transport fails or the
//! connection is closed. There is no reconnection here; a caller that wants
//! to resume creates a fresh `FeedConnection`.

use crate::error::{WsError, WsResult};
use crate::message::{RawMessage, SubscribeRequest};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Feed connection configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Fully resolved WebSocket URL.
    pub url: String,
    /// Instrument identifier sent in the subscription (e.g., "BTC-USDT-SWAP").
    pub instrument: String,
    /// Connect timeout.
    pub connect_timeout_ms: u64,
}

impl FeedConfig {
    pub fn new(url: impl Into<String>, instrument: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            instrument: instrument.into(),
            ..Default::default()
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            instrument: String::new(),
            connect_timeout_ms: 10_000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, `open` not yet called.
    Idle,
    Connecting,
    Connected,
    /// Transport failed; the stream has terminated with an error.
    Disconnected,
    /// `close` was called.
    Closed,
}

/// Single-subscription order-book feed.
pub struct FeedConnection {
    config: FeedConfig,
    state: Arc<RwLock<ConnectionState>>,
    opened: AtomicBool,
    /// Cancellation token shared with the stream for cooperative close.
    shutdown_token: CancellationToken,
}

impl FeedConnection {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Idle)),
            opened: AtomicBool::new(false),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Request close.
    ///
    /// Idempotent and safe to call from any task, including while the feed
    /// task is awaiting the transport. Calling it before `open` is a no-op
    /// apart from making any later `open` fail with `WsError::Closed`.
    pub fn close(&self) {
        if self.shutdown_token.is_cancelled() {
            debug!("Feed close already requested");
            return;
        }
        info!(instrument = %self.config.instrument, "Feed close requested");
        self.shutdown_token.cancel();
        *self.state.write() = ConnectionState::Closed;
    }

    /// Connect and send the subscription handshake.
    ///
    /// Returns the message stream. A connection can be opened once; the
    /// stream is not restartable.
    pub async fn open(&self) -> WsResult<FeedStream> {
        if self.is_closed() {
            return Err(WsError::Closed);
        }
        if self.opened.swap(true, Ordering::SeqCst) {
            return Err(WsError::AlreadyOpen);
        }

        *self.state.write() = ConnectionState::Connecting;
        info!(
            url = %self.config.url,
            instrument = %self.config.instrument,
            "Connecting to order-book feed"
        );

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        // TCP_NODELAY for lower latency
        let connect = connect_async_tls_with_config(self.config.url.as_str(), None, true, None);

        let ws_stream: WsStream = tokio::select! {
            () = self.shutdown_token.cancelled() => {
                info!("Close requested while connecting");
                return Err(WsError::Closed);
            }
            res = tokio::time::timeout(timeout, connect) => match res {
                Ok(Ok((ws, _response))) => ws,
                Ok(Err(e)) => {
                    error!(?e, "Feed connect failed");
                    self.set_state_unless_closed(ConnectionState::Disconnected);
                    return Err(e.into());
                }
                Err(_) => {
                    error!(timeout_ms = self.config.connect_timeout_ms, "Feed connect timed out");
                    self.set_state_unless_closed(ConnectionState::Disconnected);
                    return Err(WsError::ConnectTimeout(self.config.connect_timeout_ms));
                }
            }
        };

        let (mut write, read) = ws_stream.split();

        let request = SubscribeRequest::books(self.config.instrument.clone());
        let payload = serde_json::to_string(&request)?;
        if let Err(e) = write.send(Message::Text(payload)).await {
            error!(?e, "Failed to send subscription");
            self.set_state_unless_closed(ConnectionState::Disconnected);
            return Err(e.into());
        }

        self.set_state_unless_closed(ConnectionState::Connected);
        info!(instrument = %self.config.instrument, "Subscribed to order book");

        Ok(FeedStream {
            write,
            read,
            shutdown_token: self.shutdown_token.clone(),
            state: self.state.clone(),
            terminated: false,
        })
    }

    fn set_state_unless_closed(&self, next: ConnectionState) {
        let mut state = self.state.write();
        if *state != ConnectionState::Closed {
            *state = next;
        }
    }
}

/// Lazy sequence of raw messages from one open connection.
///
/// Yields `Ok` messages until the transport fails (one final `Err`, then
/// `None`) or the owning connection is closed (`None`).
pub struct FeedStream {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    shutdown_token: CancellationToken,
    state: Arc<RwLock<ConnectionState>>,
    terminated: bool,
}

impl FeedStream {
    /// Receive the next data message.
    pub async fn next_message(&mut self) -> Option<WsResult<RawMessage>> {
        if self.terminated {
            return None;
        }

        loop {
            tokio::select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    return self.finish_closed().await;
                }

                msg = self.read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            // Close may have raced the read; buffered data is discarded.
                            if self.shutdown_token.is_cancelled() {
                                return self.finish_closed().await;
                            }
                            return Some(Ok(RawMessage::new(text)));
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            if self.shutdown_token.is_cancelled() {
                                return self.finish_closed().await;
                            }
                            match String::from_utf8(bytes) {
                                Ok(text) => return Some(Ok(RawMessage::new(text))),
                                Err(e) => return self.fail(WsError::Decode(e.to_string())),
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            if let Err(e) = self.write.send(Message::Pong(data)).await {
                                return self.fail(e.into());
                            }
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("Received pong");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Feed closed by server");
                            return self.fail(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            error!(?e, "Feed read error");
                            return self.fail(e.into());
                        }
                        None => {
                            warn!("Feed stream ended");
                            return self.fail(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Adapt into a `futures` stream.
    pub fn into_stream(self) -> impl Stream<Item = WsResult<RawMessage>> + Send {
        futures_util::stream::unfold(self, |mut feed| async move {
            feed.next_message().await.map(|item| (item, feed))
        })
    }

    fn fail(&mut self, err: WsError) -> Option<WsResult<RawMessage>> {
        self.terminated = true;
        if self.shutdown_token.is_cancelled() {
            return None;
        }
        *self.state.write() = ConnectionState::Disconnected;
        Some(Err(err))
    }

    async fn finish_closed(&mut self) -> Option<WsResult<RawMessage>> {
        self.terminated = true;
        info!("Feed stream observed close");
        if let Err(e) = self.write.send(Message::Close(None)).await {
            debug!(?e, "Failed to send Close frame");
        }
        *self.state.write() = ConnectionState::Closed;
        None
    }
}
