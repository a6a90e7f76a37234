//! Per-snapshot orchestration.
//!
//! parse -> extract -> cost estimators -> classifier -> assemble -> deliver.
//! Runs strictly serially on whichever task owns the pipeline; every
//! outcome is counted and nothing is delivered after `close()`.

use crate::classifier::MakerTakerClassifier;
use crate::cost::{CostComponent, CostModel};
use crate::error::EstimatorError;
use crate::features::extract;
use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};
use tradesim_core::{EstimationResult, OrderParams};
use tradesim_feed::SnapshotParser;
use tradesim_ws::{FeedEvent, RawMessage};

/// Receives each assembled result.
pub trait ResultSink {
    fn deliver(&mut self, result: &EstimationResult);
}

impl<F> ResultSink for F
where
    F: FnMut(&EstimationResult),
{
    fn deliver(&mut self, result: &EstimationResult) {
        self(result)
    }
}

/// Feed state as observed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Live,
    Disconnected { reason: String },
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not a parseable order-book snapshot.
    Malformed,
    /// Parsed, but features cannot be computed.
    Degenerate,
    /// Exchange timestamp older than the last accepted snapshot.
    Stale,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Degenerate => "degenerate",
            Self::Stale => "stale",
        }
    }
}

/// What happened to one raw message.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    Delivered {
        latency_ms: f64,
        failed_components: Vec<CostComponent>,
    },
    /// Subscription ack, incremental book delta or other non-snapshot traffic.
    Control,
    Dropped(DropReason),
    /// Pipeline closed; message ignored.
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub processed: u64,
    pub malformed: u64,
    pub degenerate: u64,
    pub stale: u64,
    pub control: u64,
    /// Results delivered with at least one component missing.
    pub partial: u64,
    pub slippage_failures: u64,
    pub fee_failures: u64,
    pub impact_failures: u64,
}

impl PipelineStats {
    /// Snapshots rejected before a result could be produced.
    pub fn drops(&self) -> u64 {
        self.malformed + self.degenerate + self.stale
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Malformed => self.malformed += 1,
            DropReason::Degenerate => self.degenerate += 1,
            DropReason::Stale => self.stale += 1,
        }
    }

    fn record_failure(&mut self, component: CostComponent) {
        match component {
            CostComponent::Slippage => self.slippage_failures += 1,
            CostComponent::Fee => self.fee_failures += 1,
            CostComponent::MarketImpact => self.impact_failures += 1,
        }
    }
}

pub struct EstimationPipeline {
    parser: SnapshotParser,
    params: OrderParams,
    costs: CostModel,
    classifier: MakerTakerClassifier,
    sink: Box<dyn ResultSink + Send>,
    last_received_at: Option<DateTime<Utc>>,
    last_exchange_ts: Option<i64>,
    last_result: Option<EstimationResult>,
    status: FeedStatus,
    stats: PipelineStats,
}

impl EstimationPipeline {
    pub fn new(
        parser: SnapshotParser,
        params: OrderParams,
        costs: CostModel,
        classifier: MakerTakerClassifier,
        sink: Box<dyn ResultSink + Send>,
    ) -> Self {
        Self {
            parser,
            params,
            costs,
            classifier,
            sink,
            last_received_at: None,
            last_exchange_ts: None,
            last_result: None,
            status: FeedStatus::Connecting,
            stats: PipelineStats::default(),
        }
    }

    /// Process one raw message end to end.
    pub fn on_snapshot(&mut self, raw: &RawMessage) -> SnapshotOutcome {
        if self.status == FeedStatus::Closed {
            return SnapshotOutcome::Closed;
        }
        if matches!(self.status, FeedStatus::Connecting) {
            self.status = FeedStatus::Live;
        }

        let snapshot = match self.parser.parse(raw) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                self.stats.control += 1;
                return SnapshotOutcome::Control;
            }
            Err(e) => {
                debug!(error = %e, "Dropping malformed snapshot");
                return self.drop_snapshot(DropReason::Malformed);
            }
        };

        if let (Some(ts), Some(last)) = (snapshot.exchange_ts(), self.last_exchange_ts) {
            if ts < last {
                debug!(ts, last, "Dropping out-of-order snapshot");
                return self.drop_snapshot(DropReason::Stale);
            }
        }

        let features = match extract(&snapshot, &self.params) {
            Ok(fv) => fv,
            Err(EstimatorError::DegenerateBook(reason)) => {
                debug!(%reason, "Dropping degenerate snapshot");
                return self.drop_snapshot(DropReason::Degenerate);
            }
            Err(e) => {
                warn!(error = %e, "Feature extraction failed");
                return self.drop_snapshot(DropReason::Degenerate);
            }
        };

        let breakdown = self.costs.estimate_all(&features);
        let failed_components = breakdown.failed_components();
        for component in &failed_components {
            self.stats.record_failure(*component);
        }
        for err in [&breakdown.slippage, &breakdown.fee, &breakdown.market_impact]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
        {
            warn!(error = %err, "Cost estimator failed");
        }

        let maker_probability = self.classifier.predict(&features);

        let received_at = snapshot.received_at();
        let latency_ms = self
            .last_received_at
            .and_then(|prev| (received_at - prev).num_microseconds())
            .map(|us| us as f64 / 1000.0)
            .unwrap_or(0.0)
            .max(0.0);

        let result = EstimationResult::assemble(
            breakdown.slippage.ok(),
            breakdown.fee.ok(),
            breakdown.market_impact.ok(),
            maker_probability,
            latency_ms,
            received_at,
        );

        self.last_received_at = Some(received_at);
        if snapshot.exchange_ts().is_some() {
            self.last_exchange_ts = snapshot.exchange_ts();
        }
        self.stats.processed += 1;
        if result.is_partial() {
            self.stats.partial += 1;
        }

        trace!(%result, "Estimation result");
        self.sink.deliver(&result);
        self.last_result = Some(result);

        SnapshotOutcome::Delivered {
            latency_ms,
            failed_components,
        }
    }

    /// Dispatch one handoff event.
    pub fn on_feed_event(&mut self, event: FeedEvent) -> Option<SnapshotOutcome> {
        match event {
            FeedEvent::Message(raw) => Some(self.on_snapshot(&raw)),
            FeedEvent::Disconnected { reason } => {
                if self.status != FeedStatus::Closed {
                    warn!(%reason, "Feed disconnected");
                    self.status = FeedStatus::Disconnected { reason };
                }
                None
            }
        }
    }

    /// A fresh connection is being opened for this pipeline.
    pub fn mark_connecting(&mut self) {
        if self.status != FeedStatus::Closed {
            self.status = FeedStatus::Connecting;
        }
    }

    /// Replace the order parameters used for subsequent snapshots.
    pub fn set_order_params(&mut self, params: OrderParams) -> tradesim_core::Result<()> {
        params.validate()?;
        info!(
            quantity = params.quantity,
            volatility = params.volatility,
            order_type = %params.order_type,
            "Order parameters updated"
        );
        self.params = params;
        Ok(())
    }

    /// Stop delivering results. Idempotent.
    pub fn close(&mut self) {
        if self.status != FeedStatus::Closed {
            info!(processed = self.stats.processed, drops = self.stats.drops(), "Pipeline closed");
            self.status = FeedStatus::Closed;
        }
    }

    fn drop_snapshot(&mut self, reason: DropReason) -> SnapshotOutcome {
        self.stats.record_drop(reason);
        SnapshotOutcome::Dropped(reason)
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn last_result(&self) -> Option<&EstimationResult> {
        self.last_result.as_ref()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn order_params(&self) -> &OrderParams {
        &self.params
    }

    pub fn parser(&self) -> &SnapshotParser {
        &self.parser
    }

    pub fn classifier(&self) -> &MakerTakerClassifier {
        &self.classifier
    }
}
