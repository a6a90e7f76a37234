//! L2-regularised logistic regression fitted by batch gradient descent.
//!
//! Inputs are z-score standardised with statistics captured at fit time.
//! Weights start at zero and the solver has no random component, so the
//! same sample set always yields the same parameters.

use crate::error::ClassifierError;
use tradesim_core::features::MODEL_INPUT_LEN;

/// Standard deviation below which a column is treated as constant.
const MIN_STD: f64 = 1e-12;

/// Solver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    /// Stop early once the gradient's max-norm falls below this.
    pub tolerance: f64,
}

/// Fitted parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    mean: [f64; MODEL_INPUT_LEN],
    std: [f64; MODEL_INPUT_LEN],
    weights: [f64; MODEL_INPUT_LEN],
    bias: f64,
}

impl LogisticModel {
    /// Fit on `(features, label)` pairs. Labels must be 0 or 1.
    pub fn fit<'a, I>(samples: I, opts: &FitOptions) -> Result<Self, ClassifierError>
    where
        I: Iterator<Item = (&'a [f64; MODEL_INPUT_LEN], u8)> + Clone,
    {
        let n = samples.clone().count();
        if n == 0 {
            return Err(ClassifierError::InsufficientSamples { have: 0, need: 1 });
        }
        let n_f = n as f64;

        let mut mean = [0.0; MODEL_INPUT_LEN];
        for (x, _) in samples.clone() {
            for (m, v) in mean.iter_mut().zip(x) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n_f);

        let mut std = [0.0; MODEL_INPUT_LEN];
        for (x, _) in samples.clone() {
            for ((s, v), m) in std.iter_mut().zip(x).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }
        for s in std.iter_mut() {
            *s = (*s / n_f).sqrt();
            if *s < MIN_STD {
                *s = 1.0;
            }
        }
        if !all_finite(&mean) || !all_finite(&std) {
            return Err(ClassifierError::Diverged(
                "non-finite feature statistics".to_string(),
            ));
        }

        let standardised: Vec<([f64; MODEL_INPUT_LEN], f64)> = samples
            .map(|(x, y)| (standardise(x, &mean, &std), f64::from(y)))
            .collect();

        let mut weights = [0.0; MODEL_INPUT_LEN];
        let mut bias = 0.0;

        for _ in 0..opts.epochs {
            let mut grad_w = [0.0; MODEL_INPUT_LEN];
            let mut grad_b = 0.0;

            for (z, y) in &standardised {
                let err = sigmoid(dot(&weights, z) + bias) - y;
                for (g, v) in grad_w.iter_mut().zip(z) {
                    *g += err * v;
                }
                grad_b += err;
            }

            for (g, w) in grad_w.iter_mut().zip(&weights) {
                *g = *g / n_f + opts.l2 * w;
            }
            grad_b /= n_f;

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= opts.learning_rate * g;
            }
            bias -= opts.learning_rate * grad_b;

            if !all_finite(&weights) || !bias.is_finite() {
                return Err(ClassifierError::Diverged(
                    "non-finite parameters".to_string(),
                ));
            }

            let max_grad = grad_w.iter().fold(grad_b.abs(), |acc, g| acc.max(g.abs()));
            if max_grad < opts.tolerance {
                break;
            }
        }

        Ok(Self {
            mean,
            std,
            weights,
            bias,
        })
    }

    /// Probability of the positive (maker) class.
    pub fn predict_proba(&self, x: &[f64; MODEL_INPUT_LEN]) -> f64 {
        let z = standardise(x, &self.mean, &self.std);
        sigmoid(dot(&self.weights, &z) + self.bias)
    }

    pub fn weights(&self) -> &[f64; MODEL_INPUT_LEN] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}

fn standardise(
    x: &[f64; MODEL_INPUT_LEN],
    mean: &[f64; MODEL_INPUT_LEN],
    std: &[f64; MODEL_INPUT_LEN],
) -> [f64; MODEL_INPUT_LEN] {
    let mut out = [0.0; MODEL_INPUT_LEN];
    for i in 0..MODEL_INPUT_LEN {
        out[i] = (x[i] - mean[i]) / std[i];
    }
    out
}

#[inline]
fn dot(a: &[f64; MODEL_INPUT_LEN], b: &[f64; MODEL_INPUT_LEN]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        1.0 / (1.0 + (-t).exp())
    } else {
        let e = t.exp();
        e / (1.0 + e)
    }
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}
