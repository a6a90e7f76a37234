//! Estimator error types.

use crate::cost::CostComponent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("Degenerate book: {0}")]
    DegenerateBook(String),

    #[error("{component} estimator out of domain: {reason}")]
    OutOfDomain {
        component: CostComponent,
        reason: String,
    },
}

pub type EstimatorResult<T> = Result<T, EstimatorError>;

/// Classifier training failures. Never escape the classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Need {need} samples, have {have}")]
    InsufficientSamples { have: usize, need: usize },

    #[error("Training set contains a single class")]
    SingleClass,

    #[error("Solver diverged: {0}")]
    Diverged(String),
}
