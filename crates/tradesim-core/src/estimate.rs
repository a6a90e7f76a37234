//! Estimation output record.
//!
//! Numeric fields are rounded at assembly time: cost components and
//! maker/taker proportions to 4 decimal places, latency to 2.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places for cost components and proportions.
pub const VALUE_DP: u32 = 4;
/// Decimal places for latency (milliseconds).
pub const LATENCY_DP: u32 = 2;
/// Largest cost-component magnitude a result carries. Three of them still
/// sum inside the `Decimal` range.
pub const MAX_COMPONENT_MAGNITUDE: f64 = 1e27;

/// True when `value` can be stored as a rounded cost component.
pub fn is_representable(value: f64) -> bool {
    value.is_finite() && value.abs() <= MAX_COMPONENT_MAGNITUDE
}

/// Round an `f64` into a `Decimal` with the given precision.
///
/// Non-finite input maps to `None`.
pub fn round_f64(value: f64, dp: u32) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(dp))
}

/// Transaction-cost estimate for one accepted snapshot.
///
/// A cost component is `None` when its estimator failed; the result is then
/// partial and `net_cost` covers only the available components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationResult {
    /// Expected slippage (percent).
    pub slippage_pct: Option<Decimal>,
    /// Expected fee (quote currency).
    pub fee: Option<Decimal>,
    /// Expected market impact (percent).
    pub market_impact_pct: Option<Decimal>,
    /// Sum of the available components.
    pub net_cost: Decimal,
    /// Probability the order executes as maker.
    pub maker_proportion: Decimal,
    /// 1 - maker_proportion.
    pub taker_proportion: Decimal,
    /// Milliseconds since the previous accepted snapshot (0 for the first).
    pub latency_ms: Decimal,
    /// Receipt time of the snapshot this result was computed from.
    pub received_at: DateTime<Utc>,
}

impl EstimationResult {
    /// Assemble a result from raw component values.
    pub fn assemble(
        slippage_pct: Option<f64>,
        fee: Option<f64>,
        market_impact_pct: Option<f64>,
        maker_probability: f64,
        latency_ms: f64,
        received_at: DateTime<Utc>,
    ) -> Self {
        let slippage_pct = slippage_pct.filter(|v| is_representable(*v));
        let fee = fee.filter(|v| is_representable(*v));
        let market_impact_pct = market_impact_pct.filter(|v| is_representable(*v));

        let raw_net = slippage_pct.unwrap_or(0.0) + fee.unwrap_or(0.0) + market_impact_pct.unwrap_or(0.0);

        let maker = if maker_probability.is_finite() {
            maker_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let maker_proportion = round_f64(maker, VALUE_DP).unwrap_or(Decimal::ZERO);

        Self {
            slippage_pct: slippage_pct.and_then(|v| round_f64(v, VALUE_DP)),
            fee: fee.and_then(|v| round_f64(v, VALUE_DP)),
            market_impact_pct: market_impact_pct.and_then(|v| round_f64(v, VALUE_DP)),
            net_cost: round_f64(raw_net, VALUE_DP).unwrap_or(Decimal::ZERO),
            maker_proportion,
            taker_proportion: Decimal::ONE - maker_proportion,
            latency_ms: round_f64(latency_ms.max(0.0), LATENCY_DP).unwrap_or(Decimal::ZERO),
            received_at,
        }
    }

    /// True when at least one cost component is unavailable.
    pub fn is_partial(&self) -> bool {
        self.slippage_pct.is_none() || self.fee.is_none() || self.market_impact_pct.is_none()
    }

    /// Integer maker/taker percentages (e.g. `(62, 38)`), always summing to 100.
    pub fn maker_taker_percent(&self) -> (u32, u32) {
        let maker = (self.maker_proportion * Decimal::ONE_HUNDRED)
            .round()
            .to_u32()
            .unwrap_or(0)
            .min(100);
        (maker, 100 - maker)
    }

    /// Maker/taker split rendered as `"62/38"`.
    pub fn maker_taker_split(&self) -> String {
        let (maker, taker) = self.maker_taker_percent();
        format!("{maker}/{taker}")
    }
}

fn fmt_component(value: Option<Decimal>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{v:.4}{suffix}"),
        None => "n/a".to_string(),
    }
}

impl fmt::Display for EstimationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slippage={} fee={} impact={} net={:.4}{} maker/taker={} latency={:.2}ms",
            fmt_component(self.slippage_pct, "%"),
            fmt_component(self.fee, ""),
            fmt_component(self.market_impact_pct, "%"),
            self.net_cost,
            if self.is_partial() { " (partial)" } else { "" },
            self.maker_taker_split(),
            self.latency_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assemble_rounds_and_sums() {
        let result = EstimationResult::assemble(
            Some(0.123_456),
            Some(0.1),
            Some(0.010_04),
            0.625,
            12.3456,
            Utc::now(),
        );

        assert_eq!(result.slippage_pct, Some(dec!(0.1235)));
        assert_eq!(result.fee, Some(dec!(0.1)));
        assert_eq!(result.market_impact_pct, Some(dec!(0.01)));
        assert_eq!(result.net_cost, dec!(0.2335));
        assert_eq!(result.maker_proportion, dec!(0.625));
        assert_eq!(result.taker_proportion, dec!(0.375));
        assert_eq!(result.latency_ms, dec!(12.35));
        assert!(!result.is_partial());
    }

    #[test]
    fn test_partial_result() {
        let result =
            EstimationResult::assemble(Some(0.5), None, Some(0.25), 0.0, 0.0, Utc::now());

        assert!(result.is_partial());
        assert_eq!(result.fee, None);
        assert_eq!(result.net_cost, dec!(0.75));
        assert!(result.to_string().contains("fee=n/a"));
        assert!(result.to_string().contains("(partial)"));
    }

    #[test]
    fn test_large_components_keep_exact_net() {
        let result = EstimationResult::assemble(
            Some(MAX_COMPONENT_MAGNITUDE),
            Some(MAX_COMPONENT_MAGNITUDE),
            Some(MAX_COMPONENT_MAGNITUDE),
            0.0,
            0.0,
            Utc::now(),
        );
        assert!(!result.is_partial());
        assert!(result.net_cost > Decimal::from(i64::MAX));

        let result = EstimationResult::assemble(Some(1e30), Some(0.5), None, 0.0, 0.0, Utc::now());
        assert_eq!(result.slippage_pct, None);
        assert_eq!(result.net_cost, dec!(0.5));
    }

    #[test]
    fn test_maker_taker_split() {
        let result = EstimationResult::assemble(None, None, None, 0.62, 0.0, Utc::now());
        assert_eq!(result.maker_taker_split(), "62/38");

        let result = EstimationResult::assemble(None, None, None, 0.0, 0.0, Utc::now());
        assert_eq!(result.maker_taker_split(), "0/100");

        let result = EstimationResult::assemble(None, None, None, 1.7, 0.0, Utc::now());
        assert_eq!(result.maker_taker_split(), "100/0");
    }

    #[test]
    fn test_display_format() {
        let result = EstimationResult::assemble(
            Some(0.5),
            Some(0.1),
            Some(0.02),
            0.0,
            1.5,
            Utc::now(),
        );
        assert_eq!(
            result.to_string(),
            "slippage=0.5000% fee=0.1000 impact=0.0200% net=0.6200 maker/taker=0/100 latency=1.50ms"
        );
    }
}
