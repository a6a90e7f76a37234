//! Message parsing for order-book data.
//!
//! Supports two payload shapes:
//! 1. Flat: `{"bids": [[px, sz, ...], ...], "asks": [...], "timestamp": ...}`
//! 2. OKX envelope: `{"arg": {...}, "data": [{"bids": ..., "asks": ..., "ts": "..."}]}`
//!
//! Venue control messages (`{"event": "subscribe", ...}`) are recognised and
//! ignored without counting as malformed. Only full books are accepted: OKX
//! `"action": "update"` deltas are skipped and counted separately, since a
//! delta alone is not the state of the book.

use crate::error::{FeedError, FeedResult};
use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};
use tradesim_core::{BookLevel, OrderBookSnapshot, Price, Size, DEFAULT_BOOK_DEPTH};
use tradesim_ws::RawMessage;

/// Parse counters.
#[derive(Debug, Default)]
pub struct ParseStats {
    /// Messages turned into snapshots.
    pub accepted_count: AtomicU64,
    /// Messages rejected as malformed or incomplete.
    pub rejected_count: AtomicU64,
    /// Venue control messages skipped.
    pub control_count: AtomicU64,
    /// Incremental book deltas skipped.
    pub incremental_count: AtomicU64,
}

impl ParseStats {
    pub fn record_accepted(&self) {
        self.accepted_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_control(&self) {
        self.control_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_incremental(&self) {
        self.incremental_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted_count.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    pub fn control(&self) -> u64 {
        self.control_count.load(Ordering::Relaxed)
    }

    pub fn incremental(&self) -> u64 {
        self.incremental_count.load(Ordering::Relaxed)
    }
}

/// Snapshot parser.
pub struct SnapshotParser {
    /// Levels consumed per side.
    depth: usize,
    stats: ParseStats,
}

impl SnapshotParser {
    /// Create a parser keeping the top `depth` levels per side.
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            stats: ParseStats::default(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Parse a raw message.
    ///
    /// Returns `Ok(None)` for venue control messages and incremental deltas,
    /// and `Err` for anything that cannot become a two-sided snapshot. Every
    /// outcome is counted.
    pub fn parse(&self, raw: &RawMessage) -> FeedResult<Option<OrderBookSnapshot>> {
        let result = self.parse_inner(raw);
        match &result {
            Ok(Some(_)) => self.stats.record_accepted(),
            Ok(None) => {}
            Err(e) => {
                self.stats.record_rejected();
                debug!(error = %e, "Rejected feed message");
            }
        }
        result
    }

    fn parse_inner(&self, raw: &RawMessage) -> FeedResult<Option<OrderBookSnapshot>> {
        let value: Value = serde_json::from_str(raw.text())?;

        if let Some(event) = value.get("event").and_then(Value::as_str) {
            if event == "error" {
                warn!(payload = %value, "Venue reported error event");
            } else {
                debug!(event, "Venue control message");
            }
            self.stats.record_control();
            return Ok(None);
        }

        if value.get("action").and_then(Value::as_str) == Some("update") {
            trace!("Skipping incremental book update");
            self.stats.record_incremental();
            return Ok(None);
        }

        let book = match value.get("data").and_then(Value::as_array) {
            Some(entries) => entries.first().ok_or(FeedError::NotABook)?,
            None => &value,
        };

        let (bids, asks) = match (book.get("bids"), book.get("asks")) {
            (None, None) => return Err(FeedError::NotABook),
            (Some(_), None) => return Err(FeedError::MissingSide("asks")),
            (None, Some(_)) => return Err(FeedError::MissingSide("bids")),
            (Some(b), Some(a)) => (self.parse_side(b)?, self.parse_side(a)?),
        };

        let snapshot = OrderBookSnapshot::new(bids, asks, self.depth, raw.received_at())?
            .with_exchange_ts(exchange_ts(book));

        Ok(Some(snapshot))
    }

    /// Parse the first `depth` entries of one side.
    fn parse_side(&self, side: &Value) -> FeedResult<Vec<BookLevel>> {
        let levels = side
            .as_array()
            .ok_or_else(|| FeedError::InvalidLevel("side is not an array".to_string()))?;

        levels
            .iter()
            .take(self.depth)
            .map(parse_level)
            .collect()
    }
}

impl Default for SnapshotParser {
    fn default() -> Self {
        Self::new(DEFAULT_BOOK_DEPTH)
    }
}

fn parse_level(level: &Value) -> FeedResult<BookLevel> {
    let arr = level
        .as_array()
        .ok_or_else(|| FeedError::InvalidLevel("level is not an array".to_string()))?;

    if arr.len() < 2 {
        return Err(FeedError::InvalidLevel("level array too short".to_string()));
    }

    let price = Price::new(parse_decimal(&arr[0])?);
    let size = Size::new(parse_decimal(&arr[1])?);

    if !price.is_positive() {
        return Err(FeedError::InvalidLevel(format!("non-positive price: {price}")));
    }
    if size.inner().is_sign_negative() {
        return Err(FeedError::InvalidLevel(format!("negative size: {size}")));
    }

    Ok(BookLevel::new(price, size))
}

/// Venues send numbers as strings; plain JSON numbers are accepted too.
fn parse_decimal(v: &Value) -> FeedResult<Decimal> {
    let parsed = match v {
        Value::String(s) => s.parse::<Price>().map(|p| p.inner()),
        Value::Number(n) => n.to_string().parse::<Price>().map(|p| p.inner()),
        other => return Err(FeedError::InvalidLevel(format!("not a number: {other}"))),
    };
    parsed.map_err(|_| FeedError::InvalidLevel(format!("unparseable number: {v}")))
}

/// Exchange timestamp in ms from `ts` (epoch ms, number or string) or
/// `timestamp` (epoch ms or RFC 3339).
fn exchange_ts(book: &Value) -> Option<i64> {
    let v = book.get("ts").or_else(|| book.get("timestamp"))?;
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok().or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp_millis())
        }),
        _ => None,
    }
}
