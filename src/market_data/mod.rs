pub mod candle_series;
pub mod source;

pub use candle_series::{Candle, CandleSeries};
pub use source::CandleSource;
