//! Order parameters for the hypothetical order being costed.
//!
//! The simulator never submits orders; these types describe the order a
//! trader is considering so that cost and maker/taker split can be
//! estimated against the live book.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Market order: always removes liquidity.
    #[default]
    Market,
    /// Limit order: may rest on the book and add liquidity.
    Limit,
}

impl OrderType {
    #[inline]
    pub fn is_market(&self) -> bool {
        matches!(self, Self::Market)
    }

    /// Numeric encoding used as a model feature and as the training label
    /// (market = 0, anything else = 1).
    #[inline]
    pub fn as_flag(&self) -> u8 {
        match self {
            Self::Market => 0,
            Self::Limit => 1,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
        }
    }
}

impl FromStr for OrderType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "market" => Ok(Self::Market),
            "limit" => Ok(Self::Limit),
            other => Err(CoreError::UnknownOrderType(other.to_string())),
        }
    }
}

/// User-chosen parameters of the hypothetical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderParams {
    /// Order quantity in quote currency (USD equivalent).
    pub quantity: f64,
    /// Volatility as a fraction (0.02 = 2%).
    pub volatility: f64,
    /// Order type.
    pub order_type: OrderType,
}

impl OrderParams {
    pub fn new(quantity: f64, volatility: f64, order_type: OrderType) -> Self {
        Self {
            quantity,
            volatility,
            order_type,
        }
    }

    /// Validate quantity > 0 and a finite, non-negative volatility.
    pub fn validate(&self) -> Result<()> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(CoreError::InvalidOrder(format!(
                "quantity must be > 0, got {}",
                self.quantity
            )));
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(CoreError::InvalidOrder(format!(
                "volatility must be a non-negative fraction, got {}",
                self.volatility
            )));
        }
        Ok(())
    }
}

impl Default for OrderParams {
    fn default() -> Self {
        Self {
            quantity: 100.0,
            volatility: 0.02,
            order_type: OrderType::Market,
        }
    }
}

/// Exchange fee tier (rates are fractions of notional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeTier {
    /// Maker fee rate (can be zero or negative for rebates).
    pub maker: f64,
    /// Taker fee rate.
    pub taker: f64,
}

impl FeeTier {
    pub fn new(maker: f64, taker: f64) -> Self {
        Self { maker, taker }
    }

    /// Rate charged for the given order type.
    #[inline]
    pub fn rate_for(&self, order_type: OrderType) -> f64 {
        match order_type {
            OrderType::Market => self.taker,
            OrderType::Limit => self.maker,
        }
    }
}

impl Default for FeeTier {
    fn default() -> Self {
        // OKX regular tier.
        Self {
            maker: 0.0008,
            taker: 0.0010,
        }
    }
}
