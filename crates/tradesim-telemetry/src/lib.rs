//! Prometheus metrics and structured logging for tradesim.
//!
//! - Structured logging with tracing (JSON in production)
//! - Prometheus metrics for the feed, the pipeline and the classifier

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
