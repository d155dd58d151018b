// =============================================================================
// Break of Structure (BOS)
// =============================================================================
//
// Bullish: latest high takes out the highest high of the preceding `lookback`
// candles. Bearish: latest low undercuts the lowest low of the same span.
// Touching the level is not a break.
// =============================================================================

use crate::error::EngineError;
use crate::market_data::Candle;
use crate::types::Direction;

pub fn break_of_structure(
    window: &[Candle],
    direction: Direction,
    lookback: usize,
) -> Result<bool, EngineError> {
    let required = lookback + 1;
    if window.len() < required {
        return Err(EngineError::insufficient(required, window.len()));
    }

    let (prior, latest) = window.split_at(window.len() - 1);
    let latest = &latest[0];
    let prior = &prior[prior.len() - lookback..];

    let broke = match direction {
        Direction::Bullish => prior
            .iter()
            .map(|c| c.high)
            .max()
            .is_some_and(|swing_high| latest.high > swing_high),
        Direction::Bearish => prior
            .iter()
            .map(|c| c.low)
            .min()
            .is_some_and(|swing_low| latest.low < swing_low),
    };
    Ok(broke)
}
