// =============================================================================
// Moving Averages (SMA / EMA) over decimal closes
// =============================================================================
//
// SMA_t = mean(close_{t-period+1..=t})
//
// EMA:
//   multiplier = 2 / (period + 1)
//   EMA_t      = EMA_{t-1} + multiplier * (close_t - EMA_{t-1})
//
// The very first EMA value is seeded with the SMA of the first `period`
// closes. The incremental form keeps a flat series exactly flat.
// =============================================================================

use rust_decimal::Decimal;

use crate::types::MaKind;

/// Compute the rolling SMA series for `closes` and look-back `period`.
///
/// Returns an empty `Vec` when `period == 0` or the input is too short. Each
/// output element corresponds to a close starting at index `period - 1`.
pub fn calculate_sma(closes: &[Decimal], period: usize) -> Vec<Decimal> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let divisor = Decimal::from(period);
    let mut sum: Decimal = closes[..period].iter().sum();
    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sum / divisor);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        result.push(sum / divisor);
    }

    result
}

/// Compute the EMA series for `closes` and look-back `period`.
///
/// Same length contract as [`calculate_sma`].
pub fn calculate_ema(closes: &[Decimal], period: usize) -> Vec<Decimal> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = Decimal::TWO / Decimal::from(period + 1);

    // Seed: SMA of the first `period` values.
    let seed = closes[..period].iter().sum::<Decimal>() / Decimal::from(period);

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(seed);

    let mut prev = seed;
    for &close in &closes[period..] {
        prev += multiplier * (close - prev);
        result.push(prev);
    }

    result
}

/// Latest moving-average value of the requested kind, or `None` when there
/// are fewer than `period` closes.
pub fn latest_ma(closes: &[Decimal], period: usize, kind: MaKind) -> Option<Decimal> {
    match kind {
        // Only the tail window matters for the latest SMA value.
        MaKind::Simple => {
            let start = closes.len().checked_sub(period)?;
            calculate_sma(&closes[start..], period).last().copied()
        }
        MaKind::Exponential => calculate_ema(closes, period).last().copied(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ascending(n: usize) -> Vec<Decimal> {
        (1..=n).map(Decimal::from).collect()
    }

    // ---- calculate_sma ---------------------------------------------------

    #[test]
    fn sma_period_zero_or_short_input() {
        assert!(calculate_sma(&[dec!(1), dec!(2)], 0).is_empty());
        assert!(calculate_sma(&[dec!(1), dec!(2)], 3).is_empty());
    }

    #[test]
    fn sma_known_values() {
        let sma = calculate_sma(&ascending(5), 3);
        assert_eq!(sma, vec![dec!(2), dec!(3), dec!(4)]);
    }

    // ---- calculate_ema ---------------------------------------------------

    #[test]
    fn ema_period_equals_length_is_sma() {
        let ema = calculate_ema(&[dec!(2), dec!(4), dec!(6)], 3);
        assert_eq!(ema, vec![dec!(4)]);
    }

    #[test]
    fn ema_known_values() {
        // 3-period EMA, multiplier = 0.5
        let ema = calculate_ema(&[dec!(1), dec!(2), dec!(3), dec!(5), dec!(9)], 3);
        assert_eq!(ema, vec![dec!(2), dec!(3.5), dec!(6.25)]);
    }

    #[test]
    fn ema_flat_series_stays_flat() {
        let closes = vec![dec!(100.5); 60];
        assert!(calculate_ema(&closes, 21).iter().all(|v| *v == dec!(100.5)));
    }

    // ---- latest_ma -------------------------------------------------------

    #[test]
    fn latest_ma_insufficient_is_none() {
        assert!(latest_ma(&ascending(4), 5, MaKind::Simple).is_none());
        assert!(latest_ma(&ascending(4), 5, MaKind::Exponential).is_none());
    }

    #[test]
    fn latest_ma_uses_tail() {
        assert_eq!(latest_ma(&ascending(10), 4, MaKind::Simple), Some(dec!(8.5)));
        let ema = latest_ma(&ascending(10), 4, MaKind::Exponential).unwrap();
        assert!(ema > dec!(8) && ema < dec!(10));
    }
}
