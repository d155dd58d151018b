// =============================================================================
// Scanner Configuration — loaded once at startup, immutable afterwards
// =============================================================================
//
// Every field carries a serde default so a partial (or missing) JSON file
// still yields a usable configuration. `validate()` runs before any scanning
// starts; a failure there is the only fatal error the scanner knows.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::structure::ORDER_BLOCK_LOOKBACK;
use crate::types::MaKind;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "SOLUSDT".to_string(),
        "AVAXUSDT".to_string(),
    ]
}

fn default_kline_interval() -> String {
    "15m".to_string()
}

fn default_scan_interval_secs() -> u64 {
    1800
}

fn default_fast_period() -> usize {
    50
}

fn default_slow_period() -> usize {
    200
}

fn default_bos_lookback() -> usize {
    4
}

fn default_risk_reward_ratio() -> Decimal {
    Decimal::TWO
}

fn default_series_capacity() -> usize {
    250
}

fn default_price_decimals() -> u32 {
    8
}

fn default_bind_addr() -> String {
    "0.0.0.0:10000".to_string()
}

// =============================================================================
// StrategyParams
// =============================================================================

/// Largest accepted `risk_reward_ratio`.
pub const MAX_RISK_REWARD_RATIO: Decimal = Decimal::ONE_HUNDRED;

/// Tunable parameters of the confluence strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Moving-average flavour for the trend filter.
    #[serde(default)]
    pub ma_kind: MaKind,

    #[serde(default = "default_fast_period")]
    pub fast_period: usize,

    #[serde(default = "default_slow_period")]
    pub slow_period: usize,

    /// Candles preceding the latest one that a break of structure must clear.
    #[serde(default = "default_bos_lookback")]
    pub bos_lookback: usize,

    /// Take-profit distance as a multiple of the entry-to-stop distance.
    #[serde(default = "default_risk_reward_ratio")]
    pub risk_reward_ratio: Decimal,

    /// Decimal places signal levels are rounded to.
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            ma_kind: MaKind::default(),
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
            bos_lookback: default_bos_lookback(),
            risk_reward_ratio: default_risk_reward_ratio(),
            price_decimals: default_price_decimals(),
        }
    }
}

impl StrategyParams {
    /// Smallest window every detector can run on.
    pub fn required_window(&self) -> usize {
        self.slow_period
            .max(self.fast_period)
            .max(self.bos_lookback + 1)
            .max(ORDER_BLOCK_LOOKBACK)
    }
}

// =============================================================================
// ScannerConfig
// =============================================================================

/// Top-level configuration of the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Instruments to scan, e.g. "BTCUSDT".
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Kline interval requested from the candle source.
    #[serde(default = "default_kline_interval")]
    pub kline_interval: String,

    /// Seconds between scan ticks.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Candles retained per instrument.
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,

    /// Listen address for the status API.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Telegram bot token; signals are only logged when absent.
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    #[serde(default)]
    pub telegram_chat_id: Option<String>,

    #[serde(default)]
    pub strategy_params: StrategyParams,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            kline_interval: default_kline_interval(),
            scan_interval_secs: default_scan_interval_secs(),
            series_capacity: default_series_capacity(),
            bind_addr: default_bind_addr(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            strategy_params: StrategyParams::default(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scanner config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scanner config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            "scanner config loaded"
        );

        Ok(config)
    }

    /// Apply environment overrides on top of the file values.
    ///
    /// `lookup` abstracts `std::env::var` so tests do not touch the process
    /// environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(syms) = lookup("SMC_SYMBOLS") {
            self.symbols = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(addr) = lookup("SMC_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty()) {
            self.telegram_bot_token = Some(token);
        }
        if let Some(chat) = lookup("TELEGRAM_CHAT_ID").filter(|c| !c.is_empty()) {
            self.telegram_chat_id = Some(chat);
        }
    }

    /// Reject settings the scanner cannot run with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.strategy_params;

        if self.symbols.is_empty() {
            bail!("no symbols configured");
        }
        if self.scan_interval_secs == 0 {
            bail!("scan_interval_secs must be positive");
        }
        if p.fast_period == 0 || p.slow_period == 0 {
            bail!("moving-average periods must be positive");
        }
        if p.fast_period >= p.slow_period {
            bail!(
                "fast_period ({}) must be shorter than slow_period ({})",
                p.fast_period,
                p.slow_period
            );
        }
        if p.bos_lookback == 0 {
            bail!("bos_lookback must be positive");
        }
        if p.risk_reward_ratio <= Decimal::ZERO {
            bail!("risk_reward_ratio must be positive, got {}", p.risk_reward_ratio);
        }
        if p.risk_reward_ratio > MAX_RISK_REWARD_RATIO {
            bail!(
                "risk_reward_ratio must be at most {}, got {}",
                MAX_RISK_REWARD_RATIO,
                p.risk_reward_ratio
            );
        }
        if self.series_capacity < p.required_window() {
            bail!(
                "series_capacity ({}) is below the {} candles the detectors need",
                self.series_capacity,
                p.required_window()
            );
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}
