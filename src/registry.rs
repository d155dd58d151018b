// =============================================================================
// Order Block Registry — one slot per (instrument, direction)
// =============================================================================
//
// Slot lifecycle:
//
//   Empty ──detect──▶ Pending ──tap + confluence──▶ Empty   (fired)
//                       │  ▲
//                       └──┘ detect again (overwritten with fresh bounds)
//
// There is no expiry: a pending zone that is never tapped stays until a newer
// detection replaces it. The registry is owned by the scan driver and handed
// to the evaluator by `&mut`, so a slot is never touched by two evaluations
// at once.
// =============================================================================

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::Direction;

/// A price band expected to attract a reversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBlockCandidate {
    pub instrument: String,
    pub direction: Direction,
    pub zone_low: Decimal,
    pub zone_high: Decimal,
    /// Index of the zone candle within the window it was detected in.
    pub detected_at_index: usize,
    /// Open time of the zone candle, epoch ms.
    pub detected_at: i64,
}

impl OrderBlockCandidate {
    /// `true` when `price` lies inside `[zone_low, zone_high]`.
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.zone_low && price <= self.zone_high
    }

    /// The bound on the losing side of a trade taken from this zone.
    pub fn far_bound(&self) -> Decimal {
        match self.direction {
            Direction::Bullish => self.zone_low,
            Direction::Bearish => self.zone_high,
        }
    }
}

/// State of a single registry slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "candidate")]
pub enum SlotState {
    #[default]
    Empty,
    Pending(OrderBlockCandidate),
}

impl SlotState {
    pub fn candidate(&self) -> Option<&OrderBlockCandidate> {
        match self {
            SlotState::Empty => None,
            SlotState::Pending(c) => Some(c),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SlotState::Pending(_))
    }
}

/// Result of offering a detection to a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The slot was empty and now holds the detection.
    Armed,
    /// The detection overwrote an older pending candidate.
    Replaced(OrderBlockCandidate),
    /// Dropped: the zone is not newer than the last one consumed.
    AlreadyConsumed,
}

/// The two direction slots of one instrument.
///
/// Each direction remembers the zone-candle open time of the last candidate
/// it consumed. The detector rescans a rolling window, so a pattern that
/// already fired is seen again on the following ticks; those detections
/// must not re-arm the slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstrumentSlots {
    pub bullish: SlotState,
    pub bearish: SlotState,
    #[serde(skip)]
    bullish_consumed_at: Option<i64>,
    #[serde(skip)]
    bearish_consumed_at: Option<i64>,
}

impl InstrumentSlots {
    pub fn get(&self, direction: Direction) -> &SlotState {
        match direction {
            Direction::Bullish => &self.bullish,
            Direction::Bearish => &self.bearish,
        }
    }

    fn get_mut(&mut self, direction: Direction) -> &mut SlotState {
        match direction {
            Direction::Bullish => &mut self.bullish,
            Direction::Bearish => &mut self.bearish,
        }
    }

    fn consumed_at_mut(&mut self, direction: Direction) -> &mut Option<i64> {
        match direction {
            Direction::Bullish => &mut self.bullish_consumed_at,
            Direction::Bearish => &mut self.bearish_consumed_at,
        }
    }

    /// Write a freshly detected candidate into its direction's slot,
    /// overwriting any pending one.
    ///
    /// Detections whose zone candle is not newer than the last consumed
    /// zone are dropped.
    pub fn place(&mut self, candidate: OrderBlockCandidate) -> Placement {
        let direction = candidate.direction;
        if let Some(consumed_at) = *self.consumed_at_mut(direction) {
            if candidate.detected_at <= consumed_at {
                return Placement::AlreadyConsumed;
            }
        }
        match std::mem::replace(self.get_mut(direction), SlotState::Pending(candidate)) {
            SlotState::Empty => Placement::Armed,
            SlotState::Pending(previous) => Placement::Replaced(previous),
        }
    }

    /// Remove and return the pending candidate, leaving the slot empty.
    pub fn consume(&mut self, direction: Direction) -> Option<OrderBlockCandidate> {
        match std::mem::take(self.get_mut(direction)) {
            SlotState::Empty => None,
            SlotState::Pending(candidate) => {
                *self.consumed_at_mut(direction) = Some(candidate.detected_at);
                Some(candidate)
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        Direction::ALL
            .iter()
            .filter(|d| self.get(**d).is_pending())
            .count()
    }
}

/// Registry of order block slots for every scanned instrument.
#[derive(Debug, Default)]
pub struct OrderBlockRegistry {
    instruments: HashMap<String, InstrumentSlots>,
}

impl OrderBlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots for `instrument`, created empty on first access.
    pub fn slots_mut(&mut self, instrument: &str) -> &mut InstrumentSlots {
        self.instruments.entry(instrument.to_string()).or_default()
    }

    /// Read-only view of one slot. Unknown instruments read as `Empty`.
    #[cfg(test)]
    pub fn slot(&self, instrument: &str, direction: Direction) -> &SlotState {
        static EMPTY: SlotState = SlotState::Empty;
        self.instruments
            .get(instrument)
            .map_or(&EMPTY, |slots| slots.get(direction))
    }

    /// All pending candidates across instruments.
    pub fn pending(&self) -> impl Iterator<Item = &OrderBlockCandidate> {
        self.instruments
            .values()
            .flat_map(|s| [s.bullish.candidate(), s.bearish.candidate()])
            .flatten()
    }
}
