//! Online maker/taker classifier.
//!
//! Starts Untrained and answers with a closed-form heuristic. Every
//! prediction also contributes one self-labelled training sample; once
//! enough samples of both classes exist the logistic model takes over and
//! is refitted on a fixed cadence of samples seen.

mod logistic;

pub use logistic::{FitOptions, LogisticModel};

use crate::error::ClassifierError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};
use tradesim_core::features::MODEL_INPUT_LEN;
use tradesim_core::{FeatureVector, OrderType};

/// Classifier tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Samples required before the first fit.
    pub min_samples: usize,
    /// Refit every this many samples seen once trained.
    pub retrain_interval: u64,
    /// Ring buffer capacity for retained samples. Each refit is a full
    /// batch pass over this many samples on the consumer task.
    pub max_samples: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    pub tolerance: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_samples: 100,
            retrain_interval: 100,
            max_samples: 5_000,
            learning_rate: 0.5,
            epochs: 300,
            l2: 1e-3,
            tolerance: 1e-8,
        }
    }
}

impl ClassifierConfig {
    fn fit_options(&self) -> FitOptions {
        FitOptions {
            learning_rate: self.learning_rate,
            epochs: self.epochs,
            l2: self.l2,
            tolerance: self.tolerance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierState {
    Untrained,
    Trained,
}

/// One labelled observation (label 1 = maker).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub features: [f64; MODEL_INPUT_LEN],
    pub label: u8,
}

impl TrainingSample {
    /// Build a sample labelled by order type; `None` if any feature is non-finite.
    pub fn from_features(fv: &FeatureVector) -> Option<Self> {
        let features = fv.model_input();
        if !features.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self {
            features,
            label: fv.order_type.as_flag(),
        })
    }
}

/// Fallback maker probability used until the model is trained.
pub fn heuristic_probability(spread_pct: f64, quantity: f64) -> f64 {
    let spread_factor = (spread_pct / 10.0).min(0.3);
    let quantity_factor = (10.0 / quantity.max(1.0)).min(0.2);
    (0.5 + spread_factor + quantity_factor).min(1.0)
}

pub struct MakerTakerClassifier {
    config: ClassifierConfig,
    model: Option<LogisticModel>,
    samples: VecDeque<TrainingSample>,
    samples_seen: u64,
    training_events: u64,
    failed_trainings: u64,
    warned_single_class: bool,
}

impl MakerTakerClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let capacity = config.max_samples.min(4096);
        Self {
            config,
            model: None,
            samples: VecDeque::with_capacity(capacity),
            samples_seen: 0,
            training_events: 0,
            failed_trainings: 0,
            warned_single_class: false,
        }
    }

    /// Maker probability for `fv`, then record `fv` as a training sample.
    pub fn predict(&mut self, fv: &FeatureVector) -> f64 {
        let probability = self.maker_probability(fv);
        self.collect(fv);
        probability
    }

    /// Maker probability without touching the training set.
    pub fn maker_probability(&self, fv: &FeatureVector) -> f64 {
        if fv.order_type == OrderType::Market {
            return 0.0;
        }

        if let Some(model) = &self.model {
            let p = model.predict_proba(&fv.model_input());
            if p.is_finite() {
                return p.clamp(0.0, 1.0);
            }
            debug!(output = p, "Model output not finite, using heuristic");
        }

        heuristic_probability(fv.spread_pct, fv.quantity)
    }

    fn collect(&mut self, fv: &FeatureVector) {
        let Some(sample) = TrainingSample::from_features(fv) else {
            debug!("Skipping non-finite training sample");
            return;
        };

        if self.samples.len() >= self.config.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.samples_seen += 1;

        let due = match self.state() {
            ClassifierState::Untrained => self.samples.len() >= self.config.min_samples,
            ClassifierState::Trained => {
                self.config.retrain_interval > 0
                    && self.samples_seen % self.config.retrain_interval == 0
            }
        };
        if due {
            self.retrain();
        }
    }

    fn retrain(&mut self) {
        let started = Instant::now();
        match self.train() {
            Ok(model) => {
                self.model = Some(model);
                self.training_events += 1;
                info!(
                    samples = self.samples.len(),
                    samples_seen = self.samples_seen,
                    training_events = self.training_events,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "Trained maker/taker model"
                );
            }
            Err(ClassifierError::SingleClass) => {
                if self.warned_single_class {
                    debug!(samples = self.samples.len(), "Single class in training set, skipping fit");
                } else {
                    warn!(samples = self.samples.len(), "Single class in training set, skipping fit");
                    self.warned_single_class = true;
                }
            }
            Err(e) => {
                self.failed_trainings += 1;
                warn!(
                    error = %e,
                    trained = self.is_trained(),
                    "Maker/taker model fit failed, keeping previous parameters"
                );
            }
        }
    }

    fn train(&self) -> Result<LogisticModel, ClassifierError> {
        let have = self.samples.len();
        if have < self.config.min_samples {
            return Err(ClassifierError::InsufficientSamples {
                have,
                need: self.config.min_samples,
            });
        }

        let first = self.samples.front().map(|s| s.label);
        if self.samples.iter().all(|s| Some(s.label) == first) {
            return Err(ClassifierError::SingleClass);
        }

        LogisticModel::fit(
            self.samples.iter().map(|s| (&s.features, s.label)),
            &self.config.fit_options(),
        )
    }

    pub fn state(&self) -> ClassifierState {
        if self.model.is_some() {
            ClassifierState::Trained
        } else {
            ClassifierState::Untrained
        }
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Samples currently retained.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Samples accepted since construction.
    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    pub fn training_events(&self) -> u64 {
        self.training_events
    }

    pub fn failed_trainings(&self) -> u64 {
        self.failed_trainings
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

impl Default for MakerTakerClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
