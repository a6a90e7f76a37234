//! Live order-book cost estimation service.
//!
//! Wires the feed connection, the handoff channel and the estimation
//! pipeline together, and re-opens the feed after transport failures.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
