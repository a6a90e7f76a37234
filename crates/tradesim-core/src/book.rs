//! Fixed-depth order-book snapshot.
//!
//! A snapshot is built once per inbound message, consumed by feature
//! extraction and then discarded. Bids are kept in descending price order
//! and asks in ascending order, each truncated to the configured depth.

use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of levels consumed per side.
pub const DEFAULT_BOOK_DEPTH: usize = 10;

/// Single price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub size: Size,
}

impl BookLevel {
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

/// Immutable bid/ask ladder for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    bids: Vec<BookLevel>,
    asks: Vec<BookLevel>,
    /// Local receipt time of the message this snapshot was built from.
    received_at: DateTime<Utc>,
    /// Exchange timestamp (ms) when the venue supplied one.
    exchange_ts: Option<i64>,
}

impl OrderBookSnapshot {
    /// Build a snapshot, sorting each side and truncating to `depth` levels.
    ///
    /// Fails if either side is empty after truncation.
    pub fn new(
        mut bids: Vec<BookLevel>,
        mut asks: Vec<BookLevel>,
        depth: usize,
        received_at: DateTime<Utc>,
    ) -> Result<Self> {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        bids.truncate(depth);
        asks.truncate(depth);

        if bids.is_empty() {
            return Err(CoreError::EmptySide("bids"));
        }
        if asks.is_empty() {
            return Err(CoreError::EmptySide("asks"));
        }

        Ok(Self {
            bids,
            asks,
            received_at,
            exchange_ts: None,
        })
    }

    /// Attach the venue timestamp.
    pub fn with_exchange_ts(mut self, ts: Option<i64>) -> Self {
        self.exchange_ts = ts;
        self
    }

    pub fn bids(&self) -> &[BookLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[BookLevel] {
        &self.asks
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn exchange_ts(&self) -> Option<i64> {
        self.exchange_ts
    }

    pub fn best_bid(&self) -> BookLevel {
        self.bids[0]
    }

    pub fn best_ask(&self) -> BookLevel {
        self.asks[0]
    }

    /// Mid price: (best bid + best ask) / 2.
    pub fn mid_price(&self) -> Result<Price> {
        self.best_bid()
            .price
            .inner()
            .checked_add(self.best_ask().price.inner())
            .map(|sum| Price::new(sum / Decimal::TWO))
            .ok_or(CoreError::Overflow("mid price"))
    }

    /// Spread: best ask - best bid.
    pub fn spread(&self) -> Price {
        self.best_ask().price - self.best_bid().price
    }

    /// Total resting quantity across the retained bid levels.
    pub fn bid_depth(&self) -> Result<Size> {
        total_size(&self.bids).ok_or(CoreError::Overflow("bid depth"))
    }

    /// Total resting quantity across the retained ask levels.
    pub fn ask_depth(&self) -> Result<Size> {
        total_size(&self.asks).ok_or(CoreError::Overflow("ask depth"))
    }
}

fn total_size(levels: &[BookLevel]) -> Option<Size> {
    levels
        .iter()
        .try_fold(Size::ZERO, |acc, l| acc.checked_add(l.size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(px: Decimal, sz: Decimal) -> BookLevel {
        BookLevel::new(Price::new(px), Size::new(sz))
    }

    #[test]
    fn test_sorts_and_truncates() {
        let bids = (1..=15).map(|i| level(Decimal::from(i), dec!(1))).collect();
        let asks = (16..=30).rev().map(|i| level(Decimal::from(i), dec!(1))).collect();

        let book = OrderBookSnapshot::new(bids, asks, 10, Utc::now()).unwrap();

        assert_eq!(book.bids().len(), 10);
        assert_eq!(book.asks().len(), 10);
        assert_eq!(book.best_bid().price.inner(), dec!(15));
        assert_eq!(book.bids()[9].price.inner(), dec!(6));
        assert_eq!(book.best_ask().price.inner(), dec!(16));
        assert_eq!(book.asks()[9].price.inner(), dec!(25));
    }

    #[test]
    fn test_empty_side_rejected() {
        let bids = vec![level(dec!(100), dec!(1))];
        assert!(OrderBookSnapshot::new(bids.clone(), vec![], 10, Utc::now()).is_err());
        assert!(OrderBookSnapshot::new(vec![], bids, 10, Utc::now()).is_err());
    }

    #[test]
    fn test_mid_spread_depth() {
        let book = OrderBookSnapshot::new(
            vec![level(dec!(100), dec!(2)), level(dec!(99), dec!(1))],
            vec![level(dec!(101), dec!(2)), level(dec!(102), dec!(1))],
            10,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(book.mid_price().unwrap().inner(), dec!(100.5));
        assert_eq!(book.spread().inner(), dec!(1));
        assert_eq!(book.bid_depth().unwrap().inner(), dec!(3));
        assert_eq!(book.ask_depth().unwrap().inner(), dec!(3));
    }

    #[test]
    fn test_overflowing_sums_are_errors() {
        let book = OrderBookSnapshot::new(
            vec![level(dec!(100), Decimal::MAX), level(dec!(99), Decimal::MAX)],
            vec![level(dec!(101), dec!(1))],
            10,
            Utc::now(),
        )
        .unwrap();

        assert!(matches!(book.bid_depth(), Err(CoreError::Overflow(_))));
        assert_eq!(book.ask_depth().unwrap().inner(), dec!(1));
        assert_eq!(book.mid_price().unwrap().inner(), dec!(100.5));

        let book = OrderBookSnapshot::new(
            vec![level(Decimal::MAX, dec!(1))],
            vec![level(Decimal::MAX, dec!(1))],
            10,
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(book.mid_price(), Err(CoreError::Overflow(_))));
    }
}
