//! Cost estimators.
//!
//! Each estimator is a pure function of the feature vector. The pipeline
//! treats them as independent black boxes and sums whatever they return;
//! keeping the units comparable is the estimator author's contract.
//!
//! Shipped defaults:
//! - `DepthSlippage`: half-spread plus a depth-consumption term (percent)
//! - `TieredFee`: notional times the maker or taker rate (quote currency)
//! - `SquareRootImpact`: square-root impact law scaled by volatility (percent)

use crate::error::{EstimatorError, EstimatorResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tradesim_core::{is_representable, FeatureVector, FeeTier, OrderType, MAX_COMPONENT_MAGNITUDE};

/// Which part of the total cost an estimator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostComponent {
    Slippage,
    Fee,
    MarketImpact,
}

impl CostComponent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slippage => "slippage",
            Self::Fee => "fee",
            Self::MarketImpact => "market_impact",
        }
    }
}

impl fmt::Display for CostComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure cost function over a feature vector.
///
/// Implementations must be deterministic, return a finite value for
/// well-formed input and an `OutOfDomain` error otherwise.
#[cfg_attr(test, mockall::automock)]
pub trait CostEstimator: Send {
    fn component(&self) -> CostComponent;

    fn estimate(&self, features: &FeatureVector) -> EstimatorResult<f64>;
}

fn out_of_domain(component: CostComponent, reason: impl Into<String>) -> EstimatorError {
    EstimatorError::OutOfDomain {
        component,
        reason: reason.into(),
    }
}

/// Shared input checks for the default estimators.
fn check_domain(component: CostComponent, fv: &FeatureVector) -> EstimatorResult<()> {
    if !fv.is_finite() {
        return Err(out_of_domain(component, "non-finite feature"));
    }
    if fv.quantity <= 0.0 {
        return Err(out_of_domain(
            component,
            format!("quantity must be > 0, got {}", fv.quantity),
        ));
    }
    if fv.mid_price <= 0.0 {
        return Err(out_of_domain(component, "mid price must be > 0"));
    }
    Ok(())
}

/// Applied to every estimator output, so a value the result record cannot
/// hold is a declared failure rather than a silently missing component.
fn check_output(component: CostComponent, value: f64) -> EstimatorResult<f64> {
    if !value.is_finite() {
        return Err(out_of_domain(component, format!("non-finite result {value}")));
    }
    if !is_representable(value) {
        return Err(out_of_domain(
            component,
            format!("result {value:e} exceeds {MAX_COMPONENT_MAGNITUDE:e}"),
        ));
    }
    Ok(value)
}

/// Expected slippage in percent.
///
/// Market orders cross half the spread and then walk the ask side in
/// proportion to the base quantity consumed. A limit order fills at its
/// own price and pays no slippage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthSlippage {
    /// Scale of the depth-consumption term.
    pub depth_coeff: f64,
}

impl Default for DepthSlippage {
    fn default() -> Self {
        Self { depth_coeff: 1.0 }
    }
}

impl CostEstimator for DepthSlippage {
    fn component(&self) -> CostComponent {
        CostComponent::Slippage
    }

    fn estimate(&self, fv: &FeatureVector) -> EstimatorResult<f64> {
        check_domain(self.component(), fv)?;
        if fv.order_type == OrderType::Limit {
            return Ok(0.0);
        }
        let base_qty = fv.quantity / fv.mid_price;
        let half_spread = fv.spread_pct / 2.0;
        let consumption = self.depth_coeff * base_qty / fv.ask_depth * 100.0;
        check_output(self.component(), half_spread + consumption)
    }
}

/// Expected exchange fee in quote currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TieredFee {
    pub tier: FeeTier,
}

impl TieredFee {
    pub fn new(tier: FeeTier) -> Self {
        Self { tier }
    }
}

impl CostEstimator for TieredFee {
    fn component(&self) -> CostComponent {
        CostComponent::Fee
    }

    fn estimate(&self, fv: &FeatureVector) -> EstimatorResult<f64> {
        check_domain(self.component(), fv)?;
        check_output(self.component(), fv.quantity * self.tier.rate_for(fv.order_type))
    }
}

/// Expected market impact in percent:
/// `eta * volatility * sqrt(base_qty / total_depth) * 100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquareRootImpact {
    pub eta: f64,
}

impl Default for SquareRootImpact {
    fn default() -> Self {
        Self { eta: 0.5 }
    }
}

impl CostEstimator for SquareRootImpact {
    fn component(&self) -> CostComponent {
        CostComponent::MarketImpact
    }

    fn estimate(&self, fv: &FeatureVector) -> EstimatorResult<f64> {
        check_domain(self.component(), fv)?;
        if fv.volatility < 0.0 {
            return Err(out_of_domain(self.component(), "negative volatility"));
        }
        let base_qty = fv.quantity / fv.mid_price;
        let total_depth = fv.bid_depth + fv.ask_depth;
        let impact = self.eta * fv.volatility * (base_qty / total_depth).sqrt() * 100.0;
        check_output(self.component(), impact)
    }
}

/// Outcome of running all three estimators on one feature vector.
#[derive(Debug)]
pub struct CostBreakdown {
    pub slippage: EstimatorResult<f64>,
    pub fee: EstimatorResult<f64>,
    pub market_impact: EstimatorResult<f64>,
}

impl CostBreakdown {
    /// Components whose estimator failed.
    pub fn failed_components(&self) -> Vec<CostComponent> {
        let mut failed = Vec::new();
        if self.slippage.is_err() {
            failed.push(CostComponent::Slippage);
        }
        if self.fee.is_err() {
            failed.push(CostComponent::Fee);
        }
        if self.market_impact.is_err() {
            failed.push(CostComponent::MarketImpact);
        }
        failed
    }
}

/// The three estimators the pipeline drives.
pub struct CostModel {
    slippage: Box<dyn CostEstimator>,
    fee: Box<dyn CostEstimator>,
    market_impact: Box<dyn CostEstimator>,
}

impl CostModel {
    pub fn new(
        slippage: Box<dyn CostEstimator>,
        fee: Box<dyn CostEstimator>,
        market_impact: Box<dyn CostEstimator>,
    ) -> Self {
        Self {
            slippage,
            fee,
            market_impact,
        }
    }

    /// Default estimators with the given fee tier.
    pub fn with_fee_tier(tier: FeeTier) -> Self {
        Self::new(
            Box::new(DepthSlippage::default()),
            Box::new(TieredFee::new(tier)),
            Box::new(SquareRootImpact::default()),
        )
    }

    /// Run every estimator; one failing never prevents the others.
    pub fn estimate_all(&self, fv: &FeatureVector) -> CostBreakdown {
        let run = |estimator: &dyn CostEstimator, component| {
            estimator
                .estimate(fv)
                .and_then(|v| check_output(component, v))
        };
        CostBreakdown {
            slippage: run(self.slippage.as_ref(), CostComponent::Slippage),
            fee: run(self.fee.as_ref(), CostComponent::Fee),
            market_impact: run(self.market_impact.as_ref(), CostComponent::MarketImpact),
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::with_fee_tier(FeeTier::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(order_type: OrderType) -> FeatureVector {
        FeatureVector {
            quantity: 100.0,
            mid_price: 100.5,
            spread_pct: 0.995,
            imbalance: 0.5,
            depth_ratio: 1.0,
            volatility: 0.02,
            bid_depth: 3.0,
            ask_depth: 3.0,
            order_type,
        }
    }

    #[test]
    fn test_slippage_market_vs_limit() {
        let est = DepthSlippage::default();
        let market = est.estimate(&features(OrderType::Market)).unwrap();
        let expected = 0.995 / 2.0 + (100.0 / 100.5) / 3.0 * 100.0;
        assert!((market - expected).abs() < 1e-9);

        assert_eq!(est.estimate(&features(OrderType::Limit)).unwrap(), 0.0);
    }

    #[test]
    fn test_fee_uses_order_type_rate() {
        let est = TieredFee::new(FeeTier::new(0.0008, 0.0010));
        assert!((est.estimate(&features(OrderType::Market)).unwrap() - 0.1).abs() < 1e-12);
        assert!((est.estimate(&features(OrderType::Limit)).unwrap() - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_impact_square_root_law() {
        let est = SquareRootImpact { eta: 1.0 };
        let value = est.estimate(&features(OrderType::Market)).unwrap();
        let expected = 0.02 * ((100.0 / 100.5) / 6.0_f64).sqrt() * 100.0;
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_estimators_are_deterministic() {
        let model = CostModel::default();
        let fv = features(OrderType::Market);
        let a = model.estimate_all(&fv);
        let b = model.estimate_all(&fv);
        assert_eq!(a.slippage.unwrap(), b.slippage.unwrap());
        assert_eq!(a.fee.unwrap(), b.fee.unwrap());
        assert_eq!(a.market_impact.unwrap(), b.market_impact.unwrap());
    }

    #[test]
    fn test_negative_quantity_is_declared_failure() {
        let model = CostModel::default();
        let mut fv = features(OrderType::Market);
        fv.quantity = -1.0;

        let breakdown = model.estimate_all(&fv);
        assert_eq!(
            breakdown.failed_components(),
            vec![
                CostComponent::Slippage,
                CostComponent::Fee,
                CostComponent::MarketImpact
            ]
        );
        assert!(matches!(
            breakdown.fee,
            Err(EstimatorError::OutOfDomain {
                component: CostComponent::Fee,
                ..
            })
        ));
    }

    #[test]
    fn test_unrepresentable_output_is_declared_failure() {
        let model = CostModel::default();
        let mut fv = features(OrderType::Market);
        fv.quantity = 1e30;

        let breakdown = model.estimate_all(&fv);
        assert!(matches!(
            breakdown.slippage,
            Err(EstimatorError::OutOfDomain {
                component: CostComponent::Slippage,
                ..
            })
        ));
        assert!(breakdown.failed_components().contains(&CostComponent::Slippage));
    }

    #[test]
    fn test_one_failure_does_not_block_others() {
        let mut failing = MockCostEstimator::new();
        failing.expect_estimate().returning(|_| {
            Err(EstimatorError::OutOfDomain {
                component: CostComponent::Fee,
                reason: "stub".to_string(),
            })
        });

        let model = CostModel::new(
            Box::new(DepthSlippage::default()),
            Box::new(failing),
            Box::new(SquareRootImpact::default()),
        );

        let breakdown = model.estimate_all(&features(OrderType::Market));
        assert!(breakdown.slippage.is_ok());
        assert!(breakdown.market_impact.is_ok());
        assert_eq!(breakdown.failed_components(), vec![CostComponent::Fee]);
    }
}
