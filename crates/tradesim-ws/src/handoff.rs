//! Bounded handoff between the feed task and the consumer task.
//!
//! Single producer, single consumer. The producer never waits for the
//! consumer: when the buffer is full the oldest undelivered event is
//! overwritten and counted as dropped on the consumer side.

use crate::connection::FeedStream;
use crate::message::RawMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Event crossing the feed/consumer boundary.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Raw data message.
    Message(RawMessage),
    /// The transport failed; no further messages will follow.
    Disconnected { reason: String },
}

/// Producer half. Not cloneable.
pub struct HandoffSender {
    tx: broadcast::Sender<FeedEvent>,
}

impl HandoffSender {
    /// Push an event without waiting.
    ///
    /// Returns `false` if the receiver is gone.
    pub fn push(&self, event: FeedEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Consumer half.
pub struct HandoffReceiver {
    rx: broadcast::Receiver<FeedEvent>,
    dropped: Arc<AtomicU64>,
}

impl HandoffReceiver {
    /// Receive the next event, skipping over anything overwritten.
    ///
    /// Returns `None` once the sender is dropped and the buffer drained.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.dropped.fetch_add(skipped, Ordering::Relaxed);
                    warn!(skipped, "Consumer lagging, oldest feed events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Total events overwritten before the consumer saw them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Events actually buffered for a requested capacity: the underlying
/// broadcast ring rounds up to the next power of two.
pub fn effective_capacity(requested: usize) -> usize {
    requested.max(1).next_power_of_two()
}

/// Create a handoff with room for at least `capacity` undelivered events
/// (see [`effective_capacity`]).
pub fn handoff_channel(capacity: usize) -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = broadcast::channel(effective_capacity(capacity));
    (
        HandoffSender { tx },
        HandoffReceiver {
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
    )
}

/// Spawn the feed task: pump `stream` into `sender` until the stream ends.
///
/// A transport error is forwarded as `FeedEvent::Disconnected`. A close ends
/// the task silently; dropping the sender then ends the consumer's `recv`.
pub fn spawn_feed_task(mut stream: FeedStream, sender: HandoffSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = stream.next_message().await {
            match item {
                Ok(msg) => {
                    if !sender.push(FeedEvent::Message(msg)) {
                        debug!("Handoff receiver dropped, stopping feed task");
                        return;
                    }
                }
                Err(e) => {
                    error!(?e, "Feed terminated with transport error");
                    sender.push(FeedEvent::Disconnected {
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }
        debug!("Feed task finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(text: &str) -> FeedEvent {
        FeedEvent::Message(RawMessage::new(text.to_string()))
    }

    fn text_of(event: FeedEvent) -> String {
        match event {
            FeedEvent::Message(m) => m.text().to_string(),
            FeedEvent::Disconnected { reason } => format!("disconnected:{reason}"),
        }
    }

    #[tokio::test]
    async fn test_in_order_delivery() {
        let (tx, mut rx) = handoff_channel(8);
        assert!(tx.push(msg("a")));
        assert!(tx.push(msg("b")));
        drop(tx);

        assert_eq!(text_of(rx.recv().await.unwrap()), "a");
        assert_eq!(text_of(rx.recv().await.unwrap()), "b");
        assert!(rx.recv().await.is_none());
        assert_eq!(rx.dropped(), 0);
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let (tx, mut rx) = handoff_channel(2);
        for t in ["1", "2", "3", "4", "5"] {
            tx.push(msg(t));
        }
        tx.push(FeedEvent::Disconnected {
            reason: "gone".to_string(),
        });
        drop(tx);

        // Only the newest two survive; the disconnect is never lost to overflow.
        assert_eq!(text_of(rx.recv().await.unwrap()), "5");
        assert_eq!(text_of(rx.recv().await.unwrap()), "disconnected:gone");
        assert!(rx.recv().await.is_none());
        assert_eq!(rx.dropped(), 4);
    }

    #[tokio::test]
    async fn test_capacity_rounds_up_to_power_of_two() {
        assert_eq!(effective_capacity(0), 1);
        assert_eq!(effective_capacity(3), 4);
        assert_eq!(effective_capacity(1000), 1024);
        assert_eq!(effective_capacity(1024), 1024);

        let (tx, mut rx) = handoff_channel(3);
        for t in ["1", "2", "3", "4", "5", "6"] {
            tx.push(msg(t));
        }
        drop(tx);

        for expected in ["3", "4", "5", "6"] {
            assert_eq!(text_of(rx.recv().await.unwrap()), expected);
        }
        assert!(rx.recv().await.is_none());
        assert_eq!(rx.dropped(), 2);
    }

    #[test]
    fn test_recv_pending_until_push() {
        let (tx, mut rx) = handoff_channel(4);
        {
            let mut recv = tokio_test::task::spawn(rx.recv());
            tokio_test::assert_pending!(recv.poll());

            tx.push(msg("late"));
            assert!(recv.is_woken());
            let event = tokio_test::assert_ready!(recv.poll());
            assert_eq!(text_of(event.unwrap()), "late");
        }
        assert_eq!(rx.dropped(), 0);
    }

    #[test]
    fn test_push_without_receiver() {
        let (tx, rx) = handoff_channel(4);
        drop(rx);
        assert!(!tx.push(msg("x")));
    }
}
