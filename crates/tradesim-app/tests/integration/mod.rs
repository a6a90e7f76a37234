//! Integration tests for tradesim-app.
//!
//! These tests drive real WebSocket connections against an in-process
//! mock feed:
//! - Feed connection lifecycle
//! - Handoff between the feed task and the consumer
//! - End-to-end estimation and the reopen policy

pub mod common;
