//! Order-book snapshot parsing for tradesim.
//!
//! Converts raw feed messages into fixed-depth `OrderBookSnapshot`s.
//! Malformed messages are rejected and counted, never propagated as a
//! stream failure.

pub mod error;
pub mod parser;

pub use error::{FeedError, FeedResult};
pub use parser::{ParseStats, SnapshotParser};
