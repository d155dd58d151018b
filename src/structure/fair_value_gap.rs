// =============================================================================
// Fair Value Gap (FVG) — three-candle imbalance
// =============================================================================
//
//   Bullish: c[-1].low  > c[-3].high   gap = [c[-3].high, c[-1].low]
//   Bearish: c[-1].high < c[-3].low    gap = [c[-1].high, c[-3].low]
// =============================================================================

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::EngineError;
use crate::market_data::Candle;
use crate::types::Direction;

/// Price band left untraded between the first and third candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FairValueGap {
    pub direction: Direction,
    pub low: Decimal,
    pub high: Decimal,
}

pub fn fair_value_gap(
    window: &[Candle],
    direction: Direction,
) -> Result<Option<FairValueGap>, EngineError> {
    let n = window.len();
    if n < 3 {
        return Err(EngineError::insufficient(3, n));
    }
    let first = &window[n - 3];
    let last = &window[n - 1];

    let gap = match direction {
        Direction::Bullish if last.low > first.high => Some(FairValueGap {
            direction,
            low: first.high,
            high: last.low,
        }),
        Direction::Bearish if last.high < first.low => Some(FairValueGap {
            direction,
            low: last.high,
            high: first.low,
        }),
        _ => None,
    };
    Ok(gap)
}
