//! Core domain types for the tradesim cost simulator.
//!
//! This crate provides the value types shared by every stage of the
//! estimation pipeline:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `OrderBookSnapshot`: Fixed-depth bid/ask ladder
//! - `FeatureVector`: Derived per-snapshot order features
//! - `EstimationResult`: Output record handed to the consumer
//! - `OrderType`, `OrderParams`, `FeeTier`: User-chosen order parameters

pub mod book;
pub mod decimal;
pub mod error;
pub mod estimate;
pub mod features;
pub mod order;

pub use book::{BookLevel, OrderBookSnapshot, DEFAULT_BOOK_DEPTH};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use estimate::{is_representable, EstimationResult, MAX_COMPONENT_MAGNITUDE};
pub use features::FeatureVector;
pub use order::{FeeTier, OrderParams, OrderType};
