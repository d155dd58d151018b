// =============================================================================
// Market Structure Detectors
// =============================================================================
//
// Pure functions over a window of closed candles (oldest first). None of them
// mutate anything, and identical input always gives identical output. A
// window that is too short yields `EngineError::InsufficientData` (the trend
// reader reports `Sideways` instead).
//
// Comparisons are strict everywhere: a flat candle or an exact tie never
// triggers a detector.

pub mod break_of_structure;
pub mod fair_value_gap;
pub mod liquidity_sweep;
pub mod order_block;
pub mod trend;

pub use break_of_structure::break_of_structure;
pub use fair_value_gap::fair_value_gap;
pub use liquidity_sweep::liquidity_sweep;
pub use order_block::{detect_order_block, ORDER_BLOCK_LOOKBACK};
pub use trend::detect_trend;

/// Candle builders shared by the detector and evaluator tests.
#[cfg(test)]
pub(crate) mod test_support {
    use rust_decimal::Decimal;

    use crate::market_data::Candle;

    /// Mirror price axis used to turn a bullish fixture into a bearish one.
    const MIRROR_AXIS: i64 = 300;

    /// Candle with integer prices; open times are assigned by the caller.
    pub fn ohlc(open: i64, high: i64, low: i64, close: i64) -> Candle {
        Candle::new(
            0,
            Decimal::from(open),
            Decimal::from(high),
            Decimal::from(low),
            Decimal::from(close),
            Decimal::ONE_HUNDRED,
        )
    }

    /// Decimal-priced candle for fixtures that need fractional levels.
    pub fn ohlc_dec(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle::new(0, open, high, low, close, Decimal::ONE_HUNDRED)
    }

    /// Candle where only the range matters.
    pub fn hl(high: i64, low: i64) -> Candle {
        ohlc(low, high, low, high)
    }

    /// Flat candles at the given closes, one minute apart.
    pub fn closes_to_candles(closes: &[i64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let mut candle = ohlc(c, c, c, c);
                candle.open_time = i as i64 * 60_000;
                candle
            })
            .collect()
    }

    /// Reflect a candle around `MIRROR_AXIS`: up closes become down closes,
    /// highs become lows.
    pub fn mirror(c: &Candle) -> Candle {
        let axis = Decimal::from(MIRROR_AXIS);
        Candle::new(
            c.open_time,
            axis - c.open,
            axis - c.low,
            axis - c.high,
            axis - c.close,
            c.volume,
        )
    }
}
