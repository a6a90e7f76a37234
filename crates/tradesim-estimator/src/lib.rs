//! Estimation core for tradesim.
//!
//! - `features`: snapshot + order parameters -> `FeatureVector`
//! - `cost`: pluggable slippage / fee / market-impact estimators
//! - `classifier`: online maker/taker classifier
//! - `pipeline`: per-snapshot orchestration and result delivery

pub mod classifier;
pub mod cost;
pub mod error;
pub mod features;
pub mod pipeline;

pub use classifier::{ClassifierConfig, ClassifierState, MakerTakerClassifier, TrainingSample};
pub use cost::{
    CostBreakdown, CostComponent, CostEstimator, CostModel, DepthSlippage, SquareRootImpact,
    TieredFee,
};
pub use error::{ClassifierError, EstimatorError, EstimatorResult};
pub use features::extract;
pub use pipeline::{
    DropReason, EstimationPipeline, FeedStatus, PipelineStats, ResultSink, SnapshotOutcome,
};
