// =============================================================================
// Trend — fast vs slow moving average of closes
// =============================================================================

use rust_decimal::Decimal;

use crate::indicators::moving_average::latest_ma;
use crate::market_data::Candle;
use crate::types::{MaKind, Trend};

/// Read the prevailing trend from the last closes of `window`.
///
/// `Bullish` when fast MA > slow MA, `Bearish` when fast < slow. Equality, or
/// fewer than `slow_period` candles, is `Sideways`.
pub fn detect_trend(
    window: &[Candle],
    fast_period: usize,
    slow_period: usize,
    kind: MaKind,
) -> Trend {
    if slow_period == 0 || window.len() < slow_period {
        return Trend::Sideways;
    }

    let closes: Vec<Decimal> = window.iter().map(|c| c.close).collect();
    let (Some(fast), Some(slow)) = (
        latest_ma(&closes, fast_period, kind),
        latest_ma(&closes, slow_period, kind),
    ) else {
        return Trend::Sideways;
    };

    match fast.cmp(&slow) {
        std::cmp::Ordering::Greater => Trend::Bullish,
        std::cmp::Ordering::Less => Trend::Bearish,
        std::cmp::Ordering::Equal => Trend::Sideways,
    }
}
