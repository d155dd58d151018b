// =============================================================================
// Confluence Evaluator — order block lifecycle per scan tick
// =============================================================================
//
// Evaluates one instrument on every tick and drives its registry slots.
//
// Pipeline:
//   1. Require the slowest detector's window length in the series
//   2. Read the trend; Sideways ends the tick for this instrument
//   3. Per direction, detect a fresh order block and overwrite the slot
//   4. If the slot is pending, test the tap on the latest candle
//   5. On tap, require BOS + FVG + trend alignment (all of them)
//   6. On confluence, price entry / stop / target, emit a Signal and clear
//      the slot so the zone cannot fire twice
//
// Insufficient history is "no action", never an error: registry slots are
// left exactly as they were.
// =============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::market_data::{Candle, CandleSeries};
use crate::registry::{InstrumentSlots, OrderBlockCandidate, Placement, SlotState};
use crate::runtime_config::StrategyParams;
use crate::structure::{
    break_of_structure, detect_order_block, detect_trend, fair_value_gap, liquidity_sweep,
};
use crate::types::{Direction, Trend};

// =============================================================================
// Signal
// =============================================================================

/// A completed trade signal, handed to the signal sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub id: String,
    pub instrument: String,
    pub direction: Direction,
    pub entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Open time of the candle that tapped the zone.
    pub candle_time: i64,
    /// The consumed zone.
    pub zone: OrderBlockCandidate,
    /// Whether the prior candle swept liquidity beyond its body.
    pub liquidity_sweep: bool,
}

/// Target at `risk_reward_ratio` times the entry-to-stop distance, rounded
/// to `decimals` places. `None` when the target is not representable.
pub fn take_profit(
    direction: Direction,
    entry: Decimal,
    stop_loss: Decimal,
    risk_reward_ratio: Decimal,
    decimals: u32,
) -> Option<Decimal> {
    let reward = entry
        .checked_sub(stop_loss)?
        .abs()
        .checked_mul(risk_reward_ratio)?;
    let target = match direction {
        Direction::Bullish => entry.checked_add(reward)?,
        Direction::Bearish => entry.checked_sub(reward)?,
    };
    Some(target.round_dp(decimals))
}

// =============================================================================
// Scan report
// =============================================================================

/// What happened to one slot during a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome")]
pub enum SlotOutcome {
    /// Nothing pending and nothing detected.
    Idle,
    /// A zone is pending but the latest candle did not reach it.
    AwaitingTap { zone_low: Decimal, zone_high: Decimal },
    /// The zone was tapped but at least one confluence leg failed.
    ConfluenceFailed { bos: bool, fvg: bool, trend: bool },
    /// Confluence held but the take-profit overflowed; the zone stays pending.
    LevelsOverflow { entry: Decimal, stop_loss: Decimal },
    Fired(Signal),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotReport {
    pub direction: Direction,
    /// A new detection was written into the slot this tick.
    pub refreshed: bool,
    pub outcome: SlotOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict")]
pub enum ScanVerdict {
    InsufficientData { required: usize, available: usize },
    Sideways,
    Evaluated { slots: Vec<SlotReport> },
}

/// Result of evaluating one instrument on one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub instrument: String,
    pub trend: Trend,
    pub verdict: ScanVerdict,
}

impl ScanReport {
    /// Signals fired on this tick.
    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        let slots: &[SlotReport] = match &self.verdict {
            ScanVerdict::Evaluated { slots } => slots,
            _ => &[],
        };
        slots.iter().filter_map(|s| match &s.outcome {
            SlotOutcome::Fired(signal) => Some(signal),
            _ => None,
        })
    }
}

// =============================================================================
// Evaluator
// =============================================================================

pub struct ConfluenceEvaluator {
    params: StrategyParams,
}

impl ConfluenceEvaluator {
    pub fn new(params: StrategyParams) -> Self {
        Self { params }
    }

    /// Run one tick for the instrument owning `series` and `slots`.
    pub fn evaluate(
        &self,
        series: &CandleSeries,
        slots: &mut InstrumentSlots,
        now: DateTime<Utc>,
    ) -> ScanReport {
        let instrument = series.symbol().to_string();

        // ── 1. Detector window ───────────────────────────────────────────
        // The whole series is passed on so an EMA trend gets its full warm-up;
        // every other detector only reads the tail.
        let required = self.params.required_window();
        let window = match series.window(required).and_then(|_| series.window(series.len())) {
            Ok(w) => w,
            Err(_) => {
                debug!(
                    symbol = %instrument,
                    required,
                    available = series.len(),
                    "insufficient history, skipping"
                );
                return ScanReport {
                    instrument,
                    trend: Trend::Sideways,
                    verdict: ScanVerdict::InsufficientData {
                        required,
                        available: series.len(),
                    },
                };
            }
        };

        // ── 2. Trend gate ────────────────────────────────────────────────
        let trend = detect_trend(
            &window,
            self.params.fast_period,
            self.params.slow_period,
            self.params.ma_kind,
        );
        if trend == Trend::Sideways {
            debug!(symbol = %instrument, "sideways trend, skipping");
            return ScanReport {
                instrument,
                trend,
                verdict: ScanVerdict::Sideways,
            };
        }

        // ── 3-6. Each direction independently ────────────────────────────
        let slot_reports = Direction::ALL
            .iter()
            .map(|&direction| self.evaluate_slot(&instrument, &window, trend, direction, slots, now))
            .collect();

        ScanReport {
            instrument,
            trend,
            verdict: ScanVerdict::Evaluated {
                slots: slot_reports,
            },
        }
    }

    fn evaluate_slot(
        &self,
        instrument: &str,
        window: &[Candle],
        trend: Trend,
        direction: Direction,
        slots: &mut InstrumentSlots,
        now: DateTime<Utc>,
    ) -> SlotReport {
        // ── Detect and overwrite ─────────────────────────────────────────
        let refreshed = match detect_order_block(window, direction) {
            Ok(Some(zone)) => {
                let candidate = OrderBlockCandidate {
                    instrument: instrument.to_string(),
                    direction,
                    zone_low: zone.low,
                    zone_high: zone.high,
                    detected_at_index: zone.index,
                    detected_at: zone.open_time,
                };
                match slots.place(candidate) {
                    Placement::AlreadyConsumed => {
                        debug!(
                            symbol = instrument,
                            direction = %direction,
                            zone_time = zone.open_time,
                            "consumed order block re-detected, ignored"
                        );
                        false
                    }
                    placement => {
                        if let Placement::Replaced(previous) = placement {
                            debug!(
                                symbol = instrument,
                                direction = %direction,
                                old_low = %previous.zone_low,
                                old_high = %previous.zone_high,
                                "pending order block replaced"
                            );
                        }
                        debug!(
                            symbol = instrument,
                            direction = %direction,
                            zone_low = %zone.low,
                            zone_high = %zone.high,
                            "order block armed"
                        );
                        true
                    }
                }
            }
            Ok(None) => false,
            Err(e) => {
                debug!(symbol = instrument, error = %e, "order block detection skipped");
                false
            }
        };

        let report = |outcome| SlotReport {
            direction,
            refreshed,
            outcome,
        };

        let candidate = match slots.get(direction) {
            SlotState::Empty => return report(SlotOutcome::Idle),
            SlotState::Pending(c) => c.clone(),
        };

        // ── Tap ──────────────────────────────────────────────────────────
        let Some(latest) = window.last() else {
            return report(SlotOutcome::Idle);
        };
        let touch = match direction {
            Direction::Bullish => latest.low,
            Direction::Bearish => latest.high,
        };
        if !candidate.contains(touch) {
            return report(SlotOutcome::AwaitingTap {
                zone_low: candidate.zone_low,
                zone_high: candidate.zone_high,
            });
        }

        // ── Confluence ───────────────────────────────────────────────────
        let bos = break_of_structure(window, direction, self.params.bos_lookback).unwrap_or(false);
        let fvg = fair_value_gap(window, direction).is_ok_and(|gap| gap.is_some());
        let trend_ok = trend.matches(direction);

        if !(bos && fvg && trend_ok) {
            debug!(
                symbol = instrument,
                direction = %direction,
                bos,
                fvg,
                trend = trend_ok,
                "zone tapped without confluence"
            );
            return report(SlotOutcome::ConfluenceFailed {
                bos,
                fvg,
                trend: trend_ok,
            });
        }

        // ── Price levels, then fire and consume ──────────────────────────
        let entry = latest.close;
        let stop_loss = candidate.far_bound();
        let Some(target) = take_profit(
            direction,
            entry,
            stop_loss,
            self.params.risk_reward_ratio,
            self.params.price_decimals,
        ) else {
            warn!(
                symbol = instrument,
                direction = %direction,
                entry = %entry,
                stop_loss = %stop_loss,
                "take-profit overflowed, order block left pending"
            );
            return report(SlotOutcome::LevelsOverflow { entry, stop_loss });
        };

        let Some(zone) = slots.consume(direction) else {
            return report(SlotOutcome::Idle);
        };

        let signal = Signal {
            id: uuid::Uuid::new_v4().to_string(),
            instrument: instrument.to_string(),
            direction,
            entry,
            stop_loss,
            take_profit: target,
            timestamp: now,
            candle_time: latest.open_time,
            liquidity_sweep: liquidity_sweep(window, direction).unwrap_or(false),
            zone,
        };

        info!(
            symbol = instrument,
            direction = %direction,
            entry = %signal.entry,
            stop_loss = %signal.stop_loss,
            take_profit = %signal.take_profit,
            sweep = signal.liquidity_sweep,
            "order block signal fired"
        );

        report(SlotOutcome::Fired(signal))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use super::tests_support::{firing_candle, params, prefix};
    use crate::structure::test_support::{mirror, ohlc_dec};
    use rust_decimal_macros::dec;

    fn c(o: Decimal, h: Decimal, l: Decimal, cl: Decimal) -> Candle {
        ohlc_dec(o, h, l, cl)
    }

    struct Harness {
        evaluator: ConfluenceEvaluator,
        series: CandleSeries,
        slots: InstrumentSlots,
        next_time: i64,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_params(params())
        }

        fn with_params(params: StrategyParams) -> Self {
            Self {
                evaluator: ConfluenceEvaluator::new(params),
                series: CandleSeries::new("BTCUSDT", 50),
                slots: InstrumentSlots::default(),
                next_time: 0,
            }
        }

        /// Append one candle and run a tick once enough history exists.
        fn push(&mut self, mut candle: Candle) -> ScanReport {
            candle.open_time = self.next_time;
            self.next_time += 900_000;
            self.series.append(candle).unwrap();
            self.evaluator
                .evaluate(&self.series, &mut self.slots, Utc::now())
        }

        fn run(&mut self, candles: Vec<Candle>) -> Vec<ScanReport> {
            candles.into_iter().map(|c| self.push(c)).collect()
        }
    }

    fn signals_of(reports: &[ScanReport]) -> Vec<Signal> {
        reports.iter().flat_map(|r| r.signals().cloned()).collect()
    }

    #[test]
    fn full_confluence_fires_once_and_empties_slot() {
        let mut h = Harness::new();
        let warmup = h.run(prefix());
        assert!(signals_of(&warmup).is_empty());
        assert!(h.slots.bullish.is_pending());

        let report = h.push(firing_candle());
        let signals: Vec<&Signal> = report.signals().collect();
        assert_eq!(signals.len(), 1);

        let s = signals[0];
        assert_eq!(s.direction, Direction::Bullish);
        assert_eq!(s.entry, dec!(111));
        assert_eq!(s.stop_loss, dec!(100));
        assert_eq!(s.take_profit, dec!(133));
        assert_eq!(s.zone.zone_low, dec!(100));
        assert_eq!(s.zone.zone_high, dec!(105));
        assert_eq!(h.slots.bullish, SlotState::Empty);

        // Next tick has no fresh zone, so nothing fires.
        let after = h.push(c(dec!(111), dec!(113), dec!(104), dec!(112)));
        assert_eq!(after.signals().count(), 0);
    }

    #[test]
    fn fired_zone_is_not_rearmed_while_pattern_in_window() {
        let mut h = Harness::new();
        let reports = h.run(vec![
            c(dec!(100), dec!(101), dec!(99), dec!(100)),
            // Pre-run high 103, then two down closes; the second is the zone.
            c(dec!(100), dec!(103), dec!(99.5), dec!(102)),
            c(dec!(101.5), dec!(101.8), dec!(99), dec!(99.5)),
            c(dec!(100), dec!(104), dec!(97), dec!(98)),
            // Breaks the pre-run high and taps the zone with BOS and FVG.
            c(dec!(102.5), dec!(110), dec!(102), dec!(109)),
            // The same pattern is still inside the detector window here.
            c(dec!(103), dec!(103.5), dec!(101), dec!(102)),
            c(dec!(102), dec!(105), dec!(101.5), dec!(104.5)),
            // Re-taps [97,104] with BOS, FVG and a bullish trend.
            c(dec!(104), dec!(112), dec!(103.8), dec!(111)),
        ]);

        let signals = signals_of(&reports);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].candle_time, 4 * 900_000);
        assert_eq!(signals[0].zone.zone_low, dec!(97));
        assert_eq!(signals[0].zone.zone_high, dec!(104));
        assert_eq!(signals[0].zone.detected_at, 3 * 900_000);
        assert_eq!(reports[7].signals().count(), 0);

        match &reports[5].verdict {
            ScanVerdict::Evaluated { slots } => {
                assert!(!slots[0].refreshed);
                assert_eq!(slots[0].outcome, SlotOutcome::Idle);
            }
            other => panic!("unexpected verdict {other:?}"),
        }
        assert_eq!(h.slots.bullish, SlotState::Empty);
    }

    #[test]
    fn unrepresentable_target_leaves_zone_pending() {
        let mut p = params();
        p.risk_reward_ratio = Decimal::MAX;
        let mut h = Harness::with_params(p);
        h.run(prefix());

        let report = h.push(firing_candle());
        assert_eq!(report.signals().count(), 0);
        match &report.verdict {
            ScanVerdict::Evaluated { slots } => assert_eq!(
                slots[0].outcome,
                SlotOutcome::LevelsOverflow {
                    entry: dec!(111),
                    stop_loss: dec!(100)
                }
            ),
            other => panic!("unexpected verdict {other:?}"),
        }
        assert!(h.slots.bullish.is_pending());
    }

    #[test]
    fn tapped_without_confluence_stays_pending() {
        let mut h = Harness::new();
        let reports = h.run(prefix()[..5].to_vec());

        // The breakout candle arms and taps the zone, but no FVG yet.
        let last = reports.last().unwrap();
        match &last.verdict {
            ScanVerdict::Evaluated { slots } => {
                assert!(slots[0].refreshed);
                assert_eq!(
                    slots[0].outcome,
                    SlotOutcome::ConfluenceFailed {
                        bos: true,
                        fvg: false,
                        trend: true
                    }
                );
            }
            other => panic!("unexpected verdict {other:?}"),
        }
        assert!(h.slots.bullish.is_pending());
    }

    #[test]
    fn no_tap_no_signal() {
        let mut h = Harness::new();
        h.run(prefix());
        let report = h.push(c(dec!(109), dec!(112), dec!(106), dec!(111)));
        assert_eq!(report.signals().count(), 0);
        match &report.verdict {
            ScanVerdict::Evaluated { slots } => assert_eq!(
                slots[0].outcome,
                SlotOutcome::AwaitingTap {
                    zone_low: dec!(100),
                    zone_high: dec!(105)
                }
            ),
            other => panic!("unexpected verdict {other:?}"),
        }
        assert!(h.slots.bullish.is_pending());
    }

    #[test]
    fn no_fvg_no_signal() {
        let mut h = Harness::new();
        h.run(prefix());
        // Low equals the high two candles back: a tie is not a gap.
        let report = h.push(c(dec!(109), dec!(112), dec!(101.9), dec!(111)));
        assert_eq!(report.signals().count(), 0);
        assert!(h.slots.bullish.is_pending());
    }

    #[test]
    fn no_bos_no_signal() {
        let mut h = Harness::new();
        h.run(prefix());
        let report = h.push(c(dec!(109), dec!(109.5), dec!(102), dec!(109.2)));
        assert_eq!(report.signals().count(), 0);
        assert!(h.slots.bullish.is_pending());
    }

    #[test]
    fn counter_trend_no_signal() {
        let mut candles = prefix();
        candles[7] = c(dec!(101.7), dec!(110), dec!(100.9), dec!(101));

        let mut h = Harness::new();
        h.run(candles);
        let report = h.push(c(dec!(104), dec!(112), dec!(102), dec!(102.2)));

        assert_eq!(report.trend, Trend::Bearish);
        assert_eq!(report.signals().count(), 0);
        match &report.verdict {
            ScanVerdict::Evaluated { slots } => assert_eq!(
                slots[0].outcome,
                SlotOutcome::ConfluenceFailed {
                    bos: true,
                    fvg: true,
                    trend: false
                }
            ),
            other => panic!("unexpected verdict {other:?}"),
        }
        assert!(h.slots.bullish.is_pending());
    }

    #[test]
    fn bearish_mirror_fires_with_target_below_entry() {
        let mut h = Harness::new();
        let warmup = h.run(prefix().iter().map(mirror).collect());
        assert!(signals_of(&warmup).is_empty());

        let report = h.push(mirror(&firing_candle()));
        let signals: Vec<&Signal> = report.signals().collect();
        assert_eq!(signals.len(), 1);

        let s = signals[0];
        assert_eq!(s.direction, Direction::Bearish);
        assert_eq!(s.entry, dec!(189));
        assert_eq!(s.stop_loss, dec!(200));
        assert_eq!(s.take_profit, dec!(167));
        assert_eq!(h.slots.bearish, SlotState::Empty);
    }

    #[test]
    fn sideways_trend_skips_detection() {
        // Closes 104, 101, 107 put SMA(2) and SMA(3) both at 104.
        let mut candles = prefix()[..5].to_vec();
        candles[2] = c(dec!(105), dec!(105.5), dec!(102), dec!(104));

        let mut h = Harness::new();
        let reports = h.run(candles);
        let last = reports.last().unwrap();
        assert_eq!(last.verdict, ScanVerdict::Sideways);
        assert_eq!(h.slots, InstrumentSlots::default());
    }

    #[test]
    fn short_history_leaves_slots_untouched() {
        let mut h = Harness::new();
        let reports = h.run(prefix()[..4].to_vec());
        assert!(reports
            .iter()
            .all(|r| matches!(r.verdict, ScanVerdict::InsufficientData { required: 5, .. })));
        assert_eq!(h.slots, InstrumentSlots::default());
    }

    #[test]
    fn take_profit_formula_both_directions() {
        assert_eq!(
            take_profit(Direction::Bullish, dec!(111), dec!(100), dec!(2), 8),
            Some(dec!(111) + (dec!(111) - dec!(100)) * dec!(2))
        );
        assert_eq!(
            take_profit(Direction::Bearish, dec!(189), dec!(200), dec!(2), 8),
            Some(dec!(189) - (dec!(200) - dec!(189)) * dec!(2))
        );
        assert_eq!(
            take_profit(Direction::Bullish, dec!(1.2345), dec!(1.2300), dec!(1.5), 4),
            Some(dec!(1.2412))
        );
    }

    #[test]
    fn take_profit_overflow_is_none() {
        assert_eq!(
            take_profit(Direction::Bullish, Decimal::MAX, dec!(1), dec!(2), 8),
            None
        );
        assert_eq!(
            take_profit(Direction::Bearish, Decimal::MIN, dec!(-1), dec!(2), 8),
            None
        );
        assert_eq!(
            take_profit(Direction::Bullish, dec!(10), dec!(9), Decimal::MAX, 8),
            None
        );
    }
}

/// Fixtures shared with sink, state and driver tests.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use crate::structure::test_support::ohlc_dec;
    use crate::types::MaKind;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    pub fn params() -> StrategyParams {
        StrategyParams {
            ma_kind: MaKind::Simple,
            fast_period: 2,
            slow_period: 3,
            bos_lookback: 2,
            risk_reward_ratio: dec!(2),
            price_decimals: 8,
        }
    }

    fn c(o: Decimal, h: Decimal, l: Decimal, cl: Decimal) -> Candle {
        ohlc_dec(o, h, l, cl)
    }

    // Zone [100, 105] is armed on the breakout candle and tapped repeatedly
    // while price pulls back; the last candle completes BOS + FVG in an
    // uptrend.
    pub fn prefix() -> Vec<Candle> {
        vec![
            c(dec!(100), dec!(101), dec!(99), dec!(100)),
            c(dec!(104), dec!(106), dec!(103), dec!(105)),
            c(dec!(105), dec!(105.5), dec!(102), dec!(103)),
            c(dec!(104), dec!(105), dec!(100), dec!(101)),
            c(dec!(101), dec!(108), dec!(100.5), dec!(107)),
            c(dec!(107), dec!(107.5), dec!(101), dec!(101.5)),
            c(dec!(101.5), dec!(101.9), dec!(100.8), dec!(101.7)),
            c(dec!(101.7), dec!(110), dec!(103), dec!(109)),
        ]
    }

    pub fn firing_candle() -> Candle {
        c(dec!(109), dec!(112), dec!(102), dec!(111))
    }

    pub fn signal_in(direction: Direction) -> Signal {
        Signal {
            id: uuid::Uuid::new_v4().to_string(),
            instrument: "BTCUSDT".into(),
            direction,
            entry: dec!(111),
            stop_loss: dec!(100),
            take_profit: dec!(133),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            candle_time: 0,
            zone: OrderBlockCandidate {
                instrument: "BTCUSDT".into(),
                direction,
                zone_low: dec!(100),
                zone_high: dec!(105),
                detected_at_index: 3,
                detected_at: 0,
            },
            liquidity_sweep: true,
        }
    }

    pub fn signal() -> Signal {
        signal_in(Direction::Bullish)
    }
}
