// =============================================================================
// Binance REST API Client — public klines
// =============================================================================
//
// Only unauthenticated market data is used, so no key or signature is sent.
// The kline that is still forming (close time in the future) is dropped:
// detectors must only ever see closed candles.
// =============================================================================

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::error::EngineError;
use crate::market_data::{Candle, CandleSource};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance REST client bound to one kline interval and fetch size.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    interval: String,
    limit: u32,
    client: reqwest::Client,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a client fetching `limit` klines of `interval` per request.
    pub fn new(interval: impl Into<String>, limit: u32) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, interval, limit)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        interval: impl Into<String>,
        limit: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            interval: interval.into(),
            // Binance caps klines at 1000 per request.
            limit: limit.clamp(1, 1000),
            client,
        })
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/klines (public, no signature required).
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, ...
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, self.interval, self.limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let candles = parse_klines(&body, now_ms)?;

        debug!(symbol, interval = %self.interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch(&self, instrument: &str) -> Result<Vec<Candle>, EngineError> {
        self.get_klines(instrument)
            .await
            .map_err(|e| EngineError::FetchFailure {
                instrument: instrument.to_string(),
                reason: format!("{e:#}"),
            })
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("interval", &self.interval)
            .field("limit", &self.limit)
            .finish()
    }
}

// -------------------------------------------------------------------------
// Internal helpers
// -------------------------------------------------------------------------

/// Parse Binance's array-of-arrays kline payload, keeping closed candles only.
fn parse_klines(body: &serde_json::Value, now_ms: i64) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;

        if arr.len() < 7 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().context("kline openTime is not an integer")?;
        let close_time = arr[6].as_i64().context("kline closeTime is not an integer")?;
        if close_time > now_ms {
            debug!(open_time, "dropping still-forming kline");
            continue;
        }

        candles.push(Candle::new(
            open_time,
            parse_decimal(&arr[1])?,
            parse_decimal(&arr[2])?,
            parse_decimal(&arr[3])?,
            parse_decimal(&arr[4])?,
            parse_decimal(&arr[5])?,
        ));
    }
    Ok(candles)
}

/// Binance sends prices as JSON strings to preserve precision; plain numbers
/// are accepted too.
fn parse_decimal(val: &serde_json::Value) -> Result<Decimal> {
    match val {
        serde_json::Value::String(s) => {
            Decimal::from_str(s).with_context(|| format!("failed to parse '{s}' as decimal"))
        }
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .with_context(|| format!("failed to parse {n} as decimal")),
        _ => anyhow::bail!("expected string or number, got: {val}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn kline(open_time: i64, close_time: i64, close: &str) -> serde_json::Value {
        serde_json::json!([
            open_time, "37000.00", "37050.00", "36990.00", close, "123.456",
            close_time, "4567890.12", 1500, "60.123", "2224455.66", "0"
        ])
    }

    #[test]
    fn parses_closed_klines_as_decimals() {
        let body = serde_json::json!([
            kline(0, 899_999, "37020.10"),
            kline(900_000, 1_799_999, "37030.00")
        ]);
        let candles = parse_klines(&body, 2_000_000).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, dec!(37000.00));
        assert_eq!(candles[0].close, dec!(37020.10));
        assert_eq!(candles[1].open_time, 900_000);
        assert_eq!(candles[1].volume, dec!(123.456));
    }

    #[test]
    fn drops_forming_kline() {
        let body = serde_json::json!([
            kline(0, 899_999, "1"),
            kline(900_000, 1_799_999, "2")
        ]);
        let candles = parse_klines(&body, 1_000_000).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].open_time, 0);
    }

    #[test]
    fn skips_short_entries_and_rejects_garbage() {
        let body = serde_json::json!([[1, "2"], kline(0, 10, "3")]);
        assert_eq!(parse_klines(&body, 100).unwrap().len(), 1);

        let body = serde_json::json!({ "code": -1121, "msg": "Invalid symbol." });
        assert!(parse_klines(&body, 100).is_err());

        let body = serde_json::json!([kline(0, 10, "not-a-number")]);
        assert!(parse_klines(&body, 100).is_err());
    }

    #[test]
    fn numeric_fields_are_accepted() {
        assert_eq!(parse_decimal(&serde_json::json!(42.5)).unwrap(), dec!(42.5));
        assert!(parse_decimal(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn limit_is_clamped() {
        let client = BinanceClient::new("15m", 5_000).unwrap();
        assert_eq!(client.limit, 1000);
    }
}
