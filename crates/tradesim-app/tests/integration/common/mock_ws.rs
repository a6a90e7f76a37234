//! Mock order-book WebSocket server for integration tests.
//!
//! Each accepted connection:
//! - waits for the subscription request and records it
//! - plays the scripted messages in order
//! - optionally closes the connection, otherwise records anything else
//!   the client sends until it goes away

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// What the server plays to every connection.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub messages: Vec<String>,
    /// Pause between scripted messages.
    pub interval: Duration,
    /// Close the connection after the last scripted message.
    pub close_after: bool,
    /// Stop listening after this many connections; later connects are refused.
    pub accept_limit: Option<u32>,
}

impl Script {
    pub fn new(messages: Vec<String>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn closing(mut self) -> Self {
        self.close_after = true;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn accept_limit(mut self, limit: u32) -> Self {
        self.accept_limit = Some(limit);
        self
    }
}

pub struct MockFeedServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockFeedServer {
    /// Start on an available port.
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let received_clone = received.clone();
        let connections_clone = connections.clone();

        tokio::spawn(async move {
            let mut accepted = 0u32;
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            script.clone(),
                            received_clone.clone(),
                            connections_clone.clone(),
                        ));
                        accepted += 1;
                        if script.accept_limit.is_some_and(|limit| accepted >= limit) {
                            // Dropping the listener refuses further connects.
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            received,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// URL template with the instrument placeholder appended as a path.
    pub fn url_template(&self) -> String {
        format!("ws://{}/{{instrument}}", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    /// Text frames received from clients, in arrival order.
    pub async fn received_messages(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    script: Script,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<u32>>,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    // Nothing is played before the subscription arrives.
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                received.lock().await.push(text);
                break;
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Some(Ok(_)) => {}
            _ => return,
        }
    }

    for msg in &script.messages {
        if !script.interval.is_zero() {
            tokio::time::sleep(script.interval).await;
        }
        if write.send(Message::Text(msg.clone())).await.is_err() {
            return;
        }
    }

    if script.close_after {
        let _ = write.send(Message::Close(None)).await;
        return;
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => received.lock().await.push(text),
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockFeedServer::start(Script::default()).await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }
}
