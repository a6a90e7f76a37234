//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tradesim_core::{FeeTier, OrderParams, OrderType, DEFAULT_BOOK_DEPTH};
use tradesim_estimator::{
    ClassifierConfig, CostModel, DepthSlippage, SquareRootImpact, TieredFee,
};
use tradesim_ws::FeedConfig;

const INSTRUMENT_PLACEHOLDER: &str = "{instrument}";

/// Feed and reopen policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// WebSocket URL; `{instrument}` is replaced with the instrument id.
    #[serde(default = "default_url_template")]
    pub url_template: String,
    #[serde(default = "default_instrument")]
    pub instrument: String,
    /// Levels per side kept from each snapshot.
    #[serde(default = "default_book_depth")]
    pub book_depth: usize,
    /// Minimum number of undelivered events buffered between the feed task
    /// and the pipeline. Rounded up to the next power of two (1000 buffers
    /// 1024); beyond that the oldest event is dropped.
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Fresh connections attempted after a transport failure. 0 = never.
    #[serde(default = "default_max_reopen_attempts")]
    pub max_reopen_attempts: u32,
    #[serde(default = "default_reopen_base_delay_ms")]
    pub reopen_base_delay_ms: u64,
    #[serde(default = "default_reopen_max_delay_ms")]
    pub reopen_max_delay_ms: u64,
}

fn default_url_template() -> String {
    "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/{instrument}".to_string()
}

fn default_instrument() -> String {
    "BTC-USDT-SWAP".to_string()
}

fn default_book_depth() -> usize {
    DEFAULT_BOOK_DEPTH
}

fn default_handoff_capacity() -> usize {
    1024
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_max_reopen_attempts() -> u32 {
    10
}

fn default_reopen_base_delay_ms() -> u64 {
    1_000
}

fn default_reopen_max_delay_ms() -> u64 {
    30_000
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            instrument: default_instrument(),
            book_depth: default_book_depth(),
            handoff_capacity: default_handoff_capacity(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_reopen_attempts: default_max_reopen_attempts(),
            reopen_base_delay_ms: default_reopen_base_delay_ms(),
            reopen_max_delay_ms: default_reopen_max_delay_ms(),
        }
    }
}

/// Hypothetical order being costed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettings {
    /// Quote-currency quantity.
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    /// Volatility as a fraction (0.02 = 2%).
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    #[serde(default)]
    pub order_type: OrderType,
    /// Key into `[fees]`.
    #[serde(default = "default_fee_tier")]
    pub fee_tier: String,
}

fn default_quantity() -> f64 {
    100.0
}

fn default_volatility() -> f64 {
    0.02
}

fn default_fee_tier() -> String {
    "tier0".to_string()
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            quantity: default_quantity(),
            volatility: default_volatility(),
            order_type: OrderType::default(),
            fee_tier: default_fee_tier(),
        }
    }
}

/// Cost estimator coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_depth_coeff")]
    pub slippage_depth_coeff: f64,
    #[serde(default = "default_impact_eta")]
    pub impact_eta: f64,
}

fn default_depth_coeff() -> f64 {
    DepthSlippage::default().depth_coeff
}

fn default_impact_eta() -> f64 {
    SquareRootImpact::default().eta
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            slippage_depth_coeff: default_depth_coeff(),
            impact_eta: default_impact_eta(),
        }
    }
}

/// OKX fee schedule, regular user tiers.
fn default_fees() -> BTreeMap<String, FeeTier> {
    [
        ("tier0", 0.0008, 0.0010),
        ("tier1", 0.0007, 0.0009),
        ("tier2", 0.0006, 0.0008),
        ("tier3", 0.0005, 0.0007),
        ("tier4", 0.0003, 0.0005),
        ("tier5", 0.0000, 0.0003),
    ]
    .into_iter()
    .map(|(name, maker, taker)| (name.to_string(), FeeTier::new(maker, taker)))
    .collect()
}

fn default_stats_interval_secs() -> u64 {
    60
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub order: OrderSettings,
    #[serde(default = "default_fees")]
    pub fees: BTreeMap<String, FeeTier>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub model: ModelSettings,
    /// Period of the stats summary log.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed: FeedSettings::default(),
            order: OrderSettings::default(),
            fees: default_fees(),
            classifier: ClassifierConfig::default(),
            model: ModelSettings::default(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        let feed = &self.feed;
        if !feed.url_template.contains(INSTRUMENT_PLACEHOLDER) {
            return Err(AppError::Config(format!(
                "feed.url_template must contain {INSTRUMENT_PLACEHOLDER}"
            )));
        }
        if feed.instrument.trim().is_empty() {
            return Err(AppError::Config("feed.instrument is empty".to_string()));
        }
        if feed.book_depth == 0 {
            return Err(AppError::Config("feed.book_depth must be > 0".to_string()));
        }
        if feed.handoff_capacity == 0 {
            return Err(AppError::Config(
                "feed.handoff_capacity must be > 0".to_string(),
            ));
        }
        if feed.reopen_base_delay_ms > feed.reopen_max_delay_ms {
            return Err(AppError::Config(
                "feed.reopen_base_delay_ms exceeds feed.reopen_max_delay_ms".to_string(),
            ));
        }

        self.order_params().validate()?;
        self.fee_tier()?;

        let clf = &self.classifier;
        if clf.min_samples < 2 || clf.max_samples < clf.min_samples {
            return Err(AppError::Config(
                "classifier requires 2 <= min_samples <= max_samples".to_string(),
            ));
        }
        let solver_ok = clf.learning_rate.is_finite()
            && clf.learning_rate > 0.0
            && clf.l2.is_finite()
            && clf.l2 >= 0.0
            && clf.epochs > 0;
        if !solver_ok {
            return Err(AppError::Config(
                "classifier learning_rate must be > 0, l2 >= 0 and epochs > 0".to_string(),
            ));
        }

        let coeffs_ok = [self.model.slippage_depth_coeff, self.model.impact_eta]
            .iter()
            .all(|c| c.is_finite() && *c >= 0.0);
        if !coeffs_ok {
            return Err(AppError::Config(
                "model coefficients must be >= 0".to_string(),
            ));
        }
        if self.stats_interval_secs == 0 {
            return Err(AppError::Config(
                "stats_interval_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved WebSocket URL for the configured instrument.
    pub fn feed_url(&self) -> String {
        self.feed
            .url_template
            .replace(INSTRUMENT_PLACEHOLDER, &self.feed.instrument)
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            url: self.feed_url(),
            instrument: self.feed.instrument.clone(),
            connect_timeout_ms: self.feed.connect_timeout_ms,
        }
    }

    pub fn order_params(&self) -> OrderParams {
        OrderParams::new(
            self.order.quantity,
            self.order.volatility,
            self.order.order_type,
        )
    }

    pub fn fee_tier(&self) -> AppResult<FeeTier> {
        self.fees.get(&self.order.fee_tier).cloned().ok_or_else(|| {
            AppError::Config(format!("Unknown fee tier: {}", self.order.fee_tier))
        })
    }

    pub fn cost_model(&self) -> AppResult<CostModel> {
        Ok(CostModel::new(
            Box::new(DepthSlippage {
                depth_coeff: self.model.slippage_depth_coeff,
            }),
            Box::new(TieredFee::new(self.fee_tier()?)),
            Box::new(SquareRootImpact {
                eta: self.model.impact_eta,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_TOML: &str = include_str!("../../../config/default.toml");

    #[test]
    fn test_shipped_config_is_valid() {
        let config = AppConfig::from_toml(DEFAULT_TOML).unwrap();
        config.validate().unwrap();

        assert_eq!(config.feed.instrument, "BTC-USDT-SWAP");
        assert_eq!(
            config.feed_url(),
            "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP"
        );
        assert_eq!(config.order.order_type, OrderType::Market);
        assert_eq!(config.fees.len(), 6);
        assert_eq!(config.fee_tier().unwrap(), FeeTier::new(0.0008, 0.0010));
        assert_eq!(config.classifier, ClassifierConfig::default());
        assert_eq!(config.classifier.max_samples, 5_000);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        config.validate().unwrap();

        assert_eq!(config.feed.book_depth, DEFAULT_BOOK_DEPTH);
        assert_eq!(config.order.quantity, 100.0);
        assert_eq!(config.classifier.min_samples, 100);
        assert_eq!(config.stats_interval_secs, 60);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [feed]
            instrument = "ETH-USDT-SWAP"
            max_reopen_attempts = 0

            [order]
            order_type = "limit"
            fee_tier = "tier5"

            [classifier]
            retrain_interval = 50
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert!(config.feed_url().ends_with("/ETH-USDT-SWAP"));
        assert_eq!(config.feed.max_reopen_attempts, 0);
        assert_eq!(config.feed.handoff_capacity, 1024);
        assert_eq!(config.order.order_type, OrderType::Limit);
        assert_eq!(config.fee_tier().unwrap().maker, 0.0);
        assert_eq!(config.classifier.retrain_interval, 50);
        assert_eq!(config.classifier.min_samples, 100);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.order.fee_tier = "vip9".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.order.quantity = 0.0;
        assert!(matches!(config.validate(), Err(AppError::Order(_))));

        let mut config = AppConfig::default();
        config.feed.url_template = "wss://example.invalid/ws".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.feed.reopen_base_delay_ms = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_toml_reports_config_error() {
        let err = AppConfig::from_toml("[feed]\nbook_depth = \"ten\"").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
