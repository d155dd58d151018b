// =============================================================================
// Engine errors
// =============================================================================
//
// Every error that can originate inside candle analysis is local: the scan
// driver downgrades it to "no action this tick" for the affected instrument.
// Only configuration problems at startup are fatal, and those travel as
// `anyhow::Error` from `main`.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A candle did not advance the series clock.
    #[error("out-of-order candle: open_time {open_time} is not after newest {newest}")]
    OutOfOrderCandle { open_time: i64, newest: i64 },

    /// Not enough history for the requested window.
    #[error("insufficient data: need {required} candles, have {available}")]
    InsufficientData { required: usize, available: usize },

    /// The candle source could not supply data this tick.
    #[error("fetch failed for {instrument}: {reason}")]
    FetchFailure { instrument: String, reason: String },

    /// The signal sink could not be reached.
    #[error("delivery failed for {instrument}: {reason}")]
    DeliveryFailure { instrument: String, reason: String },
}

impl EngineError {
    /// Shorthand used by detectors when a window is too short.
    pub fn insufficient(required: usize, available: usize) -> Self {
        Self::InsufficientData {
            required,
            available,
        }
    }
}
