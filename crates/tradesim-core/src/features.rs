//! Feature vector derived from one snapshot plus the order parameters.

use crate::order::OrderType;
use serde::{Deserialize, Serialize};

/// Number of numeric inputs the maker/taker model consumes.
pub const MODEL_INPUT_LEN: usize = 6;

/// Per-snapshot features of the hypothetical order.
///
/// Invariants upheld by the extractor: `mid_price > 0`,
/// `imbalance` in [0, 1], `depth_ratio` in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Order quantity (quote currency).
    pub quantity: f64,
    pub mid_price: f64,
    /// Spread as a percentage of mid.
    pub spread_pct: f64,
    /// bid_depth / (bid_depth + ask_depth).
    pub imbalance: f64,
    /// min(bid_depth, ask_depth) / max(bid_depth, ask_depth).
    pub depth_ratio: f64,
    /// Volatility fraction.
    pub volatility: f64,
    pub bid_depth: f64,
    pub ask_depth: f64,
    pub order_type: OrderType,
}

impl FeatureVector {
    /// Numeric tuple used for model training and inference:
    /// order-type flag, quantity, spread %, imbalance, depth ratio, volatility.
    pub fn model_input(&self) -> [f64; MODEL_INPUT_LEN] {
        [
            f64::from(self.order_type.as_flag()),
            self.quantity,
            self.spread_pct,
            self.imbalance,
            self.depth_ratio,
            self.volatility,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.model_input().iter().all(|v| v.is_finite())
            && self.mid_price.is_finite()
            && self.bid_depth.is_finite()
            && self.ask_depth.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureVector {
        FeatureVector {
            quantity: 100.0,
            mid_price: 100.5,
            spread_pct: 0.995,
            imbalance: 0.5,
            depth_ratio: 1.0,
            volatility: 0.02,
            bid_depth: 3.0,
            ask_depth: 3.0,
            order_type: OrderType::Limit,
        }
    }

    #[test]
    fn test_model_input_order() {
        let input = sample().model_input();
        assert_eq!(input, [1.0, 100.0, 0.995, 0.5, 1.0, 0.02]);
    }

    #[test]
    fn test_non_finite_detected() {
        let mut fv = sample();
        assert!(fv.is_finite());
        fv.spread_pct = f64::NAN;
        assert!(!fv.is_finite());
    }
}
