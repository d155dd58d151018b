// =============================================================================
// Candle Source — boundary to the market-data provider
// =============================================================================

use async_trait::async_trait;

use crate::error::EngineError;
use crate::market_data::Candle;

/// Supplies recent closed candles for an instrument, oldest first.
///
/// Implementations may block on the network; any failure is reported as
/// [`EngineError::FetchFailure`] and the driver simply skips that instrument
/// for the tick.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn fetch(&self, instrument: &str) -> Result<Vec<Candle>, EngineError>;
}
