//! Application wiring and the feed reopen loop.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tradesim_core::EstimationResult;
use tradesim_estimator::{
    EstimationPipeline, MakerTakerClassifier, ResultSink, SnapshotOutcome,
};
use tradesim_feed::SnapshotParser;
use tradesim_telemetry::Metrics;
use tradesim_ws::{handoff_channel, spawn_feed_task, FeedConnection, FeedEvent};

/// How long to wait for the feed task after closing its connection.
const FEED_TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why one connection's session ended.
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    Lost { reason: String, opened: bool },
}

pub struct Application {
    config: AppConfig,
    pipeline: EstimationPipeline,
    shutdown: CancellationToken,
    reported_training_events: u64,
}

impl Application {
    /// Application that logs every result.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let instrument = config.feed.instrument.clone();
        let sink = move |result: &EstimationResult| {
            info!(instrument = %instrument, %result, "Estimate");
        };
        Self::with_sink(config, Box::new(sink), CancellationToken::new())
    }

    /// Application delivering results to `sink`, stopped by `shutdown`.
    pub fn with_sink(
        config: AppConfig,
        sink: Box<dyn ResultSink + Send>,
        shutdown: CancellationToken,
    ) -> AppResult<Self> {
        config.validate()?;

        let pipeline = EstimationPipeline::new(
            SnapshotParser::new(config.feed.book_depth),
            config.order_params(),
            config.cost_model()?,
            MakerTakerClassifier::new(config.classifier.clone()),
            sink,
        );

        Ok(Self {
            config,
            pipeline,
            shutdown,
            reported_training_events: 0,
        })
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn pipeline(&self) -> &EstimationPipeline {
        &self.pipeline
    }

    /// Run until shutdown or until the reopen budget is spent.
    pub async fn run(&mut self) -> AppResult<()> {
        let ctrl_c = {
            let token = self.shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown signal received");
                    token.cancel();
                }
            })
        };

        let result = self.run_sessions().await;
        ctrl_c.abort();

        self.pipeline.close();
        self.log_stats();
        result
    }

    async fn run_sessions(&mut self) -> AppResult<()> {
        let period = Duration::from_secs(self.config.stats_interval_secs);
        let mut stats_interval = interval_at(Instant::now() + period, period);
        stats_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let feed = self.config.feed.clone();
        let mut attempt: u32 = 0;

        info!(
            instrument = %feed.instrument,
            url = %self.config.feed_url(),
            order_type = %self.config.order.order_type,
            quantity = self.config.order.quantity,
            "Starting estimation"
        );

        loop {
            let (reason, opened) = match self.session(&mut stats_interval).await {
                SessionEnd::Shutdown => return Ok(()),
                SessionEnd::Lost { reason, opened } => (reason, opened),
            };

            if opened {
                attempt = 0;
            }
            attempt += 1;
            if attempt > feed.max_reopen_attempts {
                error!(
                    attempts = attempt - 1,
                    %reason,
                    "Feed lost, reopen attempts exhausted"
                );
                return Err(AppError::FeedLost {
                    attempts: attempt - 1,
                    reason,
                });
            }

            let delay = reopen_delay(attempt, feed.reopen_base_delay_ms, feed.reopen_max_delay_ms);
            warn!(
                attempt,
                max_attempts = feed.max_reopen_attempts,
                delay_ms = delay.as_millis() as u64,
                %reason,
                "Re-opening feed"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested during backoff");
                    return Ok(());
                }
            }
        }
    }

    /// Open one fresh connection and consume it until it ends.
    async fn session(&mut self, stats_interval: &mut tokio::time::Interval) -> SessionEnd {
        self.pipeline.mark_connecting();
        let connection = FeedConnection::new(self.config.feed_config());

        let opened = tokio::select! {
            res = connection.open() => res,
            () = self.shutdown.cancelled() => {
                connection.close();
                return SessionEnd::Shutdown;
            }
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                Metrics::feed_open_failed();
                error!(error = %e, "Failed to open feed");
                return SessionEnd::Lost {
                    reason: e.to_string(),
                    opened: false,
                };
            }
        };

        Metrics::feed_connected();
        let (sender, mut receiver) = handoff_channel(self.config.feed.handoff_capacity);
        let feed_task = spawn_feed_task(stream, sender);
        let mut reported_lag = 0u64;

        let end = loop {
            // Shutdown wins over buffered events.
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    connection.close();
                    break SessionEnd::Shutdown;
                }
                event = receiver.recv() => {
                    let lagged = receiver.dropped();
                    Metrics::handoff_lagged(lagged - reported_lag);
                    reported_lag = lagged;

                    match event {
                        Some(FeedEvent::Disconnected { reason }) => {
                            self.pipeline.on_feed_event(FeedEvent::Disconnected {
                                reason: reason.clone(),
                            });
                            break SessionEnd::Lost { reason, opened: true };
                        }
                        Some(event) => {
                            if let Some(outcome) = self.pipeline.on_feed_event(event) {
                                self.record(&outcome);
                            }
                        }
                        None => {
                            break SessionEnd::Lost {
                                reason: "feed ended".to_string(),
                                opened: true,
                            };
                        }
                    }
                }
                _ = stats_interval.tick() => self.log_stats(),
            }
        };

        if matches!(end, SessionEnd::Lost { .. }) {
            Metrics::feed_disconnected();
        }
        match tokio::time::timeout(FEED_TASK_JOIN_TIMEOUT, feed_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Feed task panicked"),
            Err(_) => warn!("Feed task did not finish in time"),
        }
        end
    }

    fn record(&mut self, outcome: &SnapshotOutcome) {
        match outcome {
            SnapshotOutcome::Delivered {
                latency_ms,
                failed_components,
            } => {
                Metrics::snapshot_processed(*latency_ms);
                for component in failed_components {
                    Metrics::estimator_failed(component.as_str());
                }
            }
            SnapshotOutcome::Dropped(reason) => Metrics::snapshot_dropped(reason.as_str()),
            SnapshotOutcome::Control | SnapshotOutcome::Closed => {}
        }

        let classifier = self.pipeline.classifier();
        let events = classifier.training_events();
        Metrics::classifier_state(
            classifier.is_trained(),
            classifier.sample_count(),
            events - self.reported_training_events,
        );
        self.reported_training_events = events;
    }

    fn log_stats(&self) {
        let stats = self.pipeline.stats();
        let parser = self.pipeline.parser().stats();
        let classifier = self.pipeline.classifier();
        info!(
            processed = stats.processed,
            drops = stats.drops(),
            malformed = stats.malformed,
            degenerate = stats.degenerate,
            stale = stats.stale,
            control = stats.control,
            partial = stats.partial,
            parser_rejected = parser.rejected(),
            classifier_trained = classifier.is_trained(),
            classifier_samples = classifier.sample_count(),
            training_events = classifier.training_events(),
            status = ?self.pipeline.status(),
            "Pipeline stats"
        );
        if let Some(result) = self.pipeline.last_result() {
            info!(%result, "Last estimate");
        }
        match Metrics::render() {
            Ok(text) => debug!(metrics = %text, "Metrics snapshot"),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }
    }
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
pub(crate) fn backoff_ms(attempt: u32, base: u64, max: u64) -> u64 {
    let exponent = attempt.saturating_sub(1).min(10);
    base.saturating_mul(1u64 << exponent).min(max)
}

/// Backoff plus up to one second of jitter, never more than the backoff itself.
fn reopen_delay(attempt: u32, base: u64, max: u64) -> Duration {
    let delay = backoff_ms(attempt, base, max);
    let jitter = rand_jitter(delay.min(1_000));
    Duration::from_millis(delay + jitter)
}

/// Clock-derived jitter in `0..=bound` milliseconds.
fn rand_jitter(bound: u64) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    if bound == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos) % (bound + 1)
}
