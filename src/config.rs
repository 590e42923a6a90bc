// src/config.rs

use crate::types::ExecutionMode;
use crate::utils::precision::normalize_quantity;
use config::{Config, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Binance Spot kline intervals we accept, with their length in milliseconds.
const SPOT_TIMEFRAMES: &[(&str, i64)] = &[
    ("1m", 60_000),
    ("3m", 180_000),
    ("5m", 300_000),
    ("15m", 900_000),
    ("30m", 1_800_000),
    ("1h", 3_600_000),
    ("2h", 7_200_000),
    ("4h", 14_400_000),
    ("6h", 21_600_000),
    ("12h", 43_200_000),
    ("1d", 86_400_000),
];

pub fn timeframe_millis(timeframe: &str) -> Option<i64> {
    SPOT_TIMEFRAMES
        .iter()
        .find(|(name, _)| *name == timeframe)
        .map(|(_, ms)| *ms)
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct StrategyConfig {
    /// EMA period the close must sit near.
    pub ma_period: usize,
    pub momentum_period: usize,
    /// RSI must be strictly above this.
    pub momentum_threshold: f64,
    /// Allowed distance from the EMA as a fraction of it (0.002 = 0.2%).
    pub proximity_band: f64,
    pub trend_fast_period: usize,
    pub trend_slow_period: usize,
    /// Closed candles to hold before exiting.
    pub exit_bars: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BinanceConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_mainnet_url")]
    pub mainnet_url: String,
    #[serde(default = "default_testnet_url")]
    pub testnet_url: String,
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub symbol: String,
    pub lower_timeframe: String,
    pub higher_timeframe: String,
    pub order_quantity: Decimal,
    /// LOT_SIZE step of the symbol. Zero disables rounding.
    #[serde(default)]
    pub quantity_step: Decimal,
    /// PRICE_FILTER tick of the symbol. Zero disables rounding.
    #[serde(default)]
    pub price_tick: Decimal,
    pub mode: ExecutionMode,
    /// Must be set for LIVE. A second switch so a typo in `mode` can't trade real funds.
    #[serde(default)]
    pub enable_live_trading: bool,
    pub poll_interval_secs: u64,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    pub trade_log_path: String,
    pub strategy: StrategyConfig,
    pub binance: BinanceConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_mainnet_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_testnet_url() -> String {
    "https://testnet.binance.vision".to_string()
}

fn default_recv_window() -> u64 {
    5_000
}

fn default_candle_limit() -> usize {
    200
}

impl AppConfig {
    /// Loads `Settings.*`, then `APP_*` env overrides, then validates.
    pub fn new() -> Result<Self, SettingsError> {
        let builder = Config::builder()
            .add_source(File::with_name("Settings"))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let mut cfg: AppConfig = builder.build()?.try_deserialize()?;

        if cfg.binance.api_key.is_empty() {
            cfg.binance.api_key = env::var("BINANCE_API_KEY").unwrap_or_default();
        }
        if cfg.binance.secret_key.is_empty() {
            cfg.binance.secret_key = env::var("BINANCE_SECRET_KEY").unwrap_or_default();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Fail-fast checks. Nothing touches the network before these pass.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |msg: String| Err(SettingsError::Invalid(msg));

        if self.symbol.trim().is_empty() {
            return invalid("symbol must be a non-empty string (e.g. BTCUSDT)".into());
        }

        let lower = match timeframe_millis(&self.lower_timeframe) {
            Some(ms) => ms,
            None => return invalid(format!("unknown lower_timeframe {}", self.lower_timeframe)),
        };
        let higher = match timeframe_millis(&self.higher_timeframe) {
            Some(ms) => ms,
            None => {
                return invalid(format!(
                    "unknown higher_timeframe {}",
                    self.higher_timeframe
                ))
            }
        };
        if higher <= lower {
            return invalid(format!(
                "higher_timeframe {} must be longer than lower_timeframe {}",
                self.higher_timeframe, self.lower_timeframe
            ));
        }

        let s = &self.strategy;
        if s.ma_period == 0 || s.momentum_period == 0 || s.trend_fast_period == 0 {
            return invalid("indicator periods must be greater than 0".into());
        }
        if s.trend_fast_period >= s.trend_slow_period {
            return invalid("trend_fast_period must be less than trend_slow_period".into());
        }
        if s.exit_bars == 0 {
            return invalid("exit_bars must be greater than 0".into());
        }
        if !(0.0..=100.0).contains(&s.momentum_threshold) {
            return invalid("momentum_threshold must be within [0, 100]".into());
        }
        if !s.proximity_band.is_finite() || s.proximity_band < 0.0 {
            return invalid("proximity_band must be a non-negative number".into());
        }

        let needed = s
            .ma_period
            .max(s.momentum_period + 1)
            .max(s.trend_slow_period);
        if self.candle_limit < needed + 1 {
            return invalid(format!(
                "candle_limit {} too small, indicators need at least {}",
                self.candle_limit,
                needed + 1
            ));
        }

        if self.order_quantity <= Decimal::ZERO {
            return invalid("order_quantity must be greater than 0".into());
        }
        if self.quantity_step < Decimal::ZERO || self.price_tick < Decimal::ZERO {
            return invalid("quantity_step and price_tick must not be negative".into());
        }
        if normalize_quantity(self.order_quantity, self.quantity_step).is_zero() {
            return invalid(format!(
                "order_quantity {} rounds to zero with quantity_step {}",
                self.order_quantity, self.quantity_step
            ));
        }

        if self.poll_interval_secs == 0 {
            return invalid("poll_interval_secs must be greater than 0".into());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".into());
        }

        match self.mode {
            ExecutionMode::DryRun => {}
            ExecutionMode::Sandbox | ExecutionMode::Live => {
                if self.binance.api_key.is_empty() || self.binance.secret_key.is_empty() {
                    return invalid(format!(
                        "API key and secret are required for {} execution",
                        self.mode
                    ));
                }
            }
        }
        if self.mode == ExecutionMode::Live && !self.enable_live_trading {
            return invalid(
                "mode is LIVE but enable_live_trading is false; refusing to trade real funds"
                    .into(),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_config() -> AppConfig {
        AppConfig {
            symbol: "BTCUSDT".to_string(),
            lower_timeframe: "5m".to_string(),
            higher_timeframe: "15m".to_string(),
            order_quantity: dec!(0.001),
            quantity_step: dec!(0.00001),
            price_tick: dec!(0.01),
            mode: ExecutionMode::DryRun,
            enable_live_trading: false,
            poll_interval_secs: 30,
            candle_limit: 200,
            trade_log_path: "data/trades.csv".to_string(),
            strategy: StrategyConfig {
                ma_period: 8,
                momentum_period: 14,
                momentum_threshold: 50.0,
                proximity_band: 0.002,
                trend_fast_period: 50,
                trend_slow_period: 100,
                exit_bars: 5,
            },
            binance: BinanceConfig {
                api_key: String::new(),
                secret_key: String::new(),
                mainnet_url: default_mainnet_url(),
                testnet_url: default_testnet_url(),
                recv_window_ms: 5_000,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
            log: LogConfig::default(),
        }
    }

    fn assert_invalid(cfg: &AppConfig, needle: &str) {
        match cfg.validate() {
            Err(SettingsError::Invalid(msg)) => {
                assert!(msg.contains(needle), "unexpected message: {msg}")
            }
            other => panic!("expected Invalid containing {needle:?}, got {other:?}"),
        }
    }

    #[test]
    fn sample_dry_run_config_is_valid() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn dry_run_needs_no_credentials() {
        let cfg = sample_config();
        assert!(cfg.binance.api_key.is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn sandbox_requires_credentials() {
        let mut cfg = sample_config();
        cfg.mode = ExecutionMode::Sandbox;
        assert_invalid(&cfg, "API key");

        cfg.binance.api_key = "k".into();
        cfg.binance.secret_key = "s".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn live_requires_explicit_switch() {
        let mut cfg = sample_config();
        cfg.mode = ExecutionMode::Live;
        cfg.binance.api_key = "k".into();
        cfg.binance.secret_key = "s".into();
        assert_invalid(&cfg, "enable_live_trading");

        cfg.enable_live_trading = true;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_or_inverted_timeframes() {
        let mut cfg = sample_config();
        cfg.lower_timeframe = "7m".into();
        assert_invalid(&cfg, "lower_timeframe");

        let mut cfg = sample_config();
        cfg.higher_timeframe = "1m".into();
        assert_invalid(&cfg, "must be longer");
    }

    #[test]
    fn rejects_bad_strategy_parameters() {
        let mut cfg = sample_config();
        cfg.strategy.exit_bars = 0;
        assert_invalid(&cfg, "exit_bars");

        let mut cfg = sample_config();
        cfg.strategy.trend_fast_period = 100;
        assert_invalid(&cfg, "trend_fast_period");

        let mut cfg = sample_config();
        cfg.strategy.momentum_threshold = 120.0;
        assert_invalid(&cfg, "momentum_threshold");

        let mut cfg = sample_config();
        cfg.candle_limit = 50;
        assert_invalid(&cfg, "candle_limit");
    }

    #[test]
    fn rejects_quantity_that_rounds_to_zero() {
        let mut cfg = sample_config();
        cfg.order_quantity = dec!(0.000001);
        assert_invalid(&cfg, "rounds to zero");

        cfg.order_quantity = dec!(0);
        assert_invalid(&cfg, "greater than 0");
    }

    #[test]
    fn timeframe_lookup() {
        assert_eq!(timeframe_millis("5m"), Some(300_000));
        assert_eq!(timeframe_millis("1d"), Some(86_400_000));
        assert_eq!(timeframe_millis("1w"), None);
    }
}
