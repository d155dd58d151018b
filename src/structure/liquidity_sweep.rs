// =============================================================================
// Liquidity Sweep — stop-hunt wick on the second-to-last candle
// =============================================================================

use crate::error::EngineError;
use crate::market_data::Candle;
use crate::types::Direction;

/// Bullish: c[-2] wicked below its body. Bearish: c[-2] wicked above it.
pub fn liquidity_sweep(window: &[Candle], direction: Direction) -> Result<bool, EngineError> {
    let n = window.len();
    if n < 2 {
        return Err(EngineError::insufficient(2, n));
    }
    let c = &window[n - 2];

    Ok(match direction {
        Direction::Bullish => c.low < c.body_low(),
        Direction::Bearish => c.high > c.body_high(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::test_support::ohlc;

    #[test]
    fn wicks_beyond_body_are_sweeps() {
        let w = vec![ohlc(10, 12, 7, 11), ohlc(11, 12, 10, 11)];
        assert_eq!(liquidity_sweep(&w, Direction::Bullish), Ok(true));
        assert_eq!(liquidity_sweep(&w, Direction::Bearish), Ok(true));
    }

    #[test]
    fn wick_flush_with_body_is_not_a_sweep() {
        // low == min(open, close), high == max(open, close)
        let w = vec![ohlc(10, 11, 10, 11), ohlc(0, 0, 0, 0)];
        assert_eq!(liquidity_sweep(&w, Direction::Bullish), Ok(false));
        assert_eq!(liquidity_sweep(&w, Direction::Bearish), Ok(false));
    }

    #[test]
    fn single_candle_is_insufficient() {
        let w = vec![ohlc(10, 12, 7, 11)];
        assert_eq!(
            liquidity_sweep(&w, Direction::Bullish),
            Err(EngineError::insufficient(2, 1))
        );
    }
}
