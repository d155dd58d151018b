// =============================================================================
// Order Block Candidate Detector
// =============================================================================
//
// Looks at the last ORDER_BLOCK_LOOKBACK candles for:
//
//   [pre-run] [counter 1] [counter 2] [break]
//
// where both counter candles close against the eventual direction (down
// closes for Bullish, up closes for Bearish) and the break candle takes out
// the pre-run candle's high (Bullish) or low (Bearish). The zone is the
// range of the last counter candle, the one price reversed from.
//
// When several placements match, the most recent one wins.
// =============================================================================

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::EngineError;
use crate::market_data::Candle;
use crate::types::Direction;

/// Candles inspected per detection.
pub const ORDER_BLOCK_LOOKBACK: usize = 5;

/// Consecutive counter-direction closes that make up the run.
const COUNTER_RUN: usize = 2;

/// Candles spanned by one pattern: pre-run + run + break.
const PATTERN_LEN: usize = COUNTER_RUN + 2;

/// Zone returned by a successful detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderBlockZone {
    pub direction: Direction,
    pub low: Decimal,
    pub high: Decimal,
    /// Index of the zone candle inside the window that was scanned.
    pub index: usize,
    /// Open time of the zone candle.
    pub open_time: i64,
}

pub fn detect_order_block(
    window: &[Candle],
    direction: Direction,
) -> Result<Option<OrderBlockZone>, EngineError> {
    let n = window.len();
    if n < ORDER_BLOCK_LOOKBACK {
        return Err(EngineError::insufficient(ORDER_BLOCK_LOOKBACK, n));
    }
    let offset = n - ORDER_BLOCK_LOOKBACK;
    let recent = &window[offset..];

    // Walk placements newest-first so the latest match wins.
    for start in (0..=ORDER_BLOCK_LOOKBACK - PATTERN_LEN).rev() {
        let pattern = &recent[start..start + PATTERN_LEN];
        let pre_run = &pattern[0];
        let run = &pattern[1..=COUNTER_RUN];
        let breaker = &pattern[PATTERN_LEN - 1];

        let matched = match direction {
            Direction::Bullish => run.iter().all(Candle::is_down) && breaker.high > pre_run.high,
            Direction::Bearish => run.iter().all(Candle::is_up) && breaker.low < pre_run.low,
        };

        if matched {
            let zone_candle = &run[COUNTER_RUN - 1];
            return Ok(Some(OrderBlockZone {
                direction,
                low: zone_candle.low,
                high: zone_candle.high,
                index: offset + start + COUNTER_RUN,
                open_time: zone_candle.open_time,
            }));
        }
    }

    Ok(None)
}
