use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single closed OHLCV candle. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time, epoch milliseconds.
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Closed above its open.
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }

    /// Closed below its open.
    pub fn is_down(&self) -> bool {
        self.close < self.open
    }

    /// Lower edge of the real body.
    pub fn body_low(&self) -> Decimal {
        self.open.min(self.close)
    }

    /// Upper edge of the real body.
    pub fn body_high(&self) -> Decimal {
        self.open.max(self.close)
    }
}

/// Outcome of merging a fetched batch into a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Candles that advanced the series.
    pub appended: usize,
    /// Candles already covered by the series (re-fetch overlap).
    pub stale: usize,
    /// Candles refused because they broke ordering inside the batch.
    pub rejected: usize,
}

// ---------------------------------------------------------------------------
// CandleSeries -- bounded, strictly time-ordered ring per instrument
// ---------------------------------------------------------------------------

/// Ring buffer holding the most recent closed candles of one instrument.
///
/// Candles are kept oldest-first. Every appended candle must open strictly
/// after the current newest one; once `capacity` is exceeded the oldest
/// candle is evicted.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    symbol: String,
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleSeries {
    /// Create an empty series that retains at most `capacity` candles.
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.into(),
            candles: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// The newest candle, if any.
    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Append one candle.
    ///
    /// Fails with [`EngineError::OutOfOrderCandle`] when `candle.open_time` is
    /// not strictly greater than the newest stored open time; the series is
    /// left untouched in that case.
    pub fn append(&mut self, candle: Candle) -> Result<(), EngineError> {
        if let Some(newest) = self.candles.back() {
            if candle.open_time <= newest.open_time {
                return Err(EngineError::OutOfOrderCandle {
                    open_time: candle.open_time,
                    newest: newest.open_time,
                });
            }
        }

        self.candles.push_back(candle);
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
        Ok(())
    }

    /// Merge a fetched batch (oldest-first) into the series.
    ///
    /// Candles at or before the current newest open time are overlap from a
    /// re-fetch and are skipped. Anything else goes through [`append`], so a
    /// batch that is itself out of order has the offending candles rejected.
    ///
    /// [`append`]: CandleSeries::append
    pub fn ingest(&mut self, batch: impl IntoIterator<Item = Candle>) -> IngestSummary {
        let mut summary = IngestSummary::default();
        let watermark = self.latest().map(|c| c.open_time);

        for candle in batch {
            if watermark.is_some_and(|w| candle.open_time <= w) {
                summary.stale += 1;
                continue;
            }
            match self.append(candle) {
                Ok(()) => summary.appended += 1,
                Err(e) => {
                    warn!(symbol = %self.symbol, error = %e, "candle rejected");
                    summary.rejected += 1;
                }
            }
        }

        debug!(
            symbol = %self.symbol,
            appended = summary.appended,
            stale = summary.stale,
            rejected = summary.rejected,
            len = self.candles.len(),
            "batch ingested"
        );
        summary
    }

    /// Return the most recent `n` candles (oldest-first).
    ///
    /// Fails with [`EngineError::InsufficientData`] when fewer than `n` are
    /// stored.
    pub fn window(&self, n: usize) -> Result<Vec<Candle>, EngineError> {
        let available = self.candles.len();
        if available < n {
            return Err(EngineError::insufficient(n, available));
        }
        Ok(self.candles.range(available - n..).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
