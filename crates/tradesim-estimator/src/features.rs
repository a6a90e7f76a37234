//! Feature extraction.
//!
//! Pure and deterministic: the same snapshot and parameters always yield
//! the same vector.

use crate::error::{EstimatorError, EstimatorResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tradesim_core::{CoreError, FeatureVector, OrderBookSnapshot, OrderParams};

/// Derive the feature vector for a hypothetical order against `snapshot`.
///
/// Fails with `DegenerateBook` when either side carries zero liquidity,
/// the mid price is not positive, the book is crossed, or a depth or mid
/// sum leaves the decimal range.
pub fn extract(snapshot: &OrderBookSnapshot, params: &OrderParams) -> EstimatorResult<FeatureVector> {
    let bid_depth = snapshot.bid_depth().map_err(degenerate)?;
    let ask_depth = snapshot.ask_depth().map_err(degenerate)?;

    if !bid_depth.is_positive() {
        return Err(EstimatorError::DegenerateBook("zero bid liquidity".to_string()));
    }
    if !ask_depth.is_positive() {
        return Err(EstimatorError::DegenerateBook("zero ask liquidity".to_string()));
    }

    let spread = snapshot.spread();
    if spread.inner().is_sign_negative() && !spread.is_zero() {
        return Err(EstimatorError::DegenerateBook(format!(
            "crossed book: bid {} > ask {}",
            snapshot.best_bid().price,
            snapshot.best_ask().price
        )));
    }

    let mid = snapshot.mid_price().map_err(degenerate)?;
    if !mid.is_positive() {
        return Err(EstimatorError::DegenerateBook(format!("mid price {mid}")));
    }

    // Spread % in exact arithmetic before dropping to f64.
    let spread_pct = (spread.inner() / mid.inner() * Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or(f64::NAN);

    let bid = bid_depth.to_f64();
    let ask = ask_depth.to_f64();

    Ok(FeatureVector {
        quantity: params.quantity,
        mid_price: mid.to_f64(),
        spread_pct,
        imbalance: bid / (bid + ask),
        depth_ratio: bid.min(ask) / bid.max(ask),
        volatility: params.volatility,
        bid_depth: bid,
        ask_depth: ask,
        order_type: params.order_type,
    })
}

fn degenerate(e: CoreError) -> EstimatorError {
    EstimatorError::DegenerateBook(e.to_string())
}
