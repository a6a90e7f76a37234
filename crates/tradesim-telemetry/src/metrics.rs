//! Prometheus metrics for tradesim.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error caught on first use.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

/// Feed connection state (1 = connected, 0 = disconnected).
pub static FEED_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("tradesim_feed_connected", "Feed connection state (1=connected)").unwrap()
});

/// Connection opens, labelled by outcome.
pub static FEED_OPENS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tradesim_feed_opens_total",
        "Feed connection open attempts",
        &["outcome"]
    )
    .unwrap()
});

pub static FEED_DISCONNECTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tradesim_feed_disconnects_total",
        "Feed transport failures"
    )
    .unwrap()
});

pub static SNAPSHOTS_PROCESSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tradesim_snapshots_processed_total",
        "Snapshots that produced an estimation result"
    )
    .unwrap()
});

/// Labels: reason (malformed/degenerate/stale/handoff_lagged)
pub static SNAPSHOTS_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tradesim_snapshots_dropped_total",
        "Snapshots dropped before producing a result",
        &["reason"]
    )
    .unwrap()
});

/// Milliseconds between consecutive accepted snapshots.
pub static UPDATE_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tradesim_update_latency_ms",
        "Receipt-time delta between accepted snapshots in milliseconds",
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Labels: component (slippage/fee/market_impact)
pub static ESTIMATOR_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tradesim_estimator_failures_total",
        "Cost estimator failures",
        &["component"]
    )
    .unwrap()
});

pub static CLASSIFIER_TRAINED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tradesim_classifier_trained",
        "Maker/taker classifier state (1=trained)"
    )
    .unwrap()
});

pub static CLASSIFIER_TRAINING_EVENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tradesim_classifier_training_events_total",
        "Successful classifier fits"
    )
    .unwrap()
});

pub static CLASSIFIER_SAMPLES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tradesim_classifier_samples",
        "Training samples currently retained"
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn feed_connected() {
        FEED_CONNECTED.set(1.0);
        FEED_OPENS_TOTAL.with_label_values(&["ok"]).inc();
    }

    pub fn feed_open_failed() {
        FEED_OPENS_TOTAL.with_label_values(&["error"]).inc();
    }

    pub fn feed_disconnected() {
        FEED_CONNECTED.set(0.0);
        FEED_DISCONNECTS_TOTAL.inc();
    }

    /// Record a delivered result.
    pub fn snapshot_processed(latency_ms: f64) {
        SNAPSHOTS_PROCESSED_TOTAL.inc();
        UPDATE_LATENCY_MS.observe(latency_ms);
    }

    pub fn snapshot_dropped(reason: &str) {
        SNAPSHOTS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Events overwritten in the handoff before the consumer saw them.
    pub fn handoff_lagged(count: u64) {
        if count > 0 {
            SNAPSHOTS_DROPPED_TOTAL
                .with_label_values(&["handoff_lagged"])
                .inc_by(count);
        }
    }

    pub fn estimator_failed(component: &str) {
        ESTIMATOR_FAILURES_TOTAL.with_label_values(&[component]).inc();
    }

    /// Sync classifier gauges; `new_training_events` is the delta since the last call.
    pub fn classifier_state(trained: bool, samples: usize, new_training_events: u64) {
        CLASSIFIER_TRAINED.set(i64::from(trained));
        CLASSIFIER_SAMPLES.set(i64::try_from(samples).unwrap_or(i64::MAX));
        if new_training_events > 0 {
            CLASSIFIER_TRAINING_EVENTS_TOTAL.inc_by(new_training_events);
        }
    }

    /// Text exposition of every registered metric.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
