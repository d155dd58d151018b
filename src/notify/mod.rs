// =============================================================================
// Signal Delivery
// =============================================================================
//
// The evaluator's job ends at producing an immutable `Signal`. Sinks take it
// from there. Delivery is at-most-once: a failed delivery is reported back to
// the driver, which logs it; the zone stays consumed.

pub mod telegram;

use async_trait::async_trait;
use tracing::info;

use crate::error::EngineError;
use crate::strategy::Signal;
use crate::types::Direction;

pub use telegram::TelegramSink;

#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn deliver(&self, signal: &Signal) -> Result<(), EngineError>;
}

/// Sink used when no chat credentials are configured: the signal only goes
/// to the log.
pub struct LogSink;

#[async_trait]
impl SignalSink for LogSink {
    async fn deliver(&self, signal: &Signal) -> Result<(), EngineError> {
        info!(
            id = %signal.id,
            symbol = %signal.instrument,
            direction = %signal.direction,
            entry = %signal.entry,
            stop_loss = %signal.stop_loss,
            take_profit = %signal.take_profit,
            "signal (log sink)"
        );
        Ok(())
    }
}

/// Markdown message body for chat delivery.
pub fn format_signal(signal: &Signal) -> String {
    let (icon, side, trend) = match signal.direction {
        Direction::Bullish => ("📈", "LONG", "Uptrend"),
        Direction::Bearish => ("📉", "SHORT", "Downtrend"),
    };
    let sweep = if signal.liquidity_sweep { "✅" } else { "➖" };

    format!(
        "{icon} *A+ SMC Trade Signal!*\n\n\
         📌 Pair: {pair}\n\
         🧭 Side: {side}\n\
         🕒 Time: {time}\n\n\
         🎯 Entry: `{entry}`\n\
         🛑 Stop Loss: `{sl}`\n\
         💰 Take Profit: `{tp}`\n\n\
         SMC Confluence:\n\
         ✅ Order Block Hit [{zone_low} - {zone_high}]\n\
         ✅ BOS\n\
         ✅ Fair Value Gap\n\
         ✅ {trend}\n\
         {sweep} Liquidity Sweep\n\n\
         👉 Confirm setup and enter wisely.",
        pair = signal.instrument,
        time = signal.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        entry = signal.entry,
        sl = signal.stop_loss,
        tp = signal.take_profit,
        zone_low = signal.zone.zone_low,
        zone_high = signal.zone.zone_high,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::tests_support::signal_in as sample_signal;

    #[test]
    fn message_lists_levels_and_confluence() {
        let msg = format_signal(&sample_signal(Direction::Bullish));
        assert!(msg.contains("Pair: BTCUSDT"));
        assert!(msg.contains("LONG"));
        assert!(msg.contains("Entry: `111`"));
        assert!(msg.contains("Stop Loss: `100`"));
        assert!(msg.contains("Take Profit: `133`"));
        assert!(msg.contains("[100 - 105]"));
        assert!(msg.contains("2024-05-01 12:30:00 UTC"));
        assert!(msg.contains("✅ Uptrend"));
    }

    #[test]
    fn bearish_message_says_short() {
        let msg = format_signal(&sample_signal(Direction::Bearish));
        assert!(msg.contains("SHORT"));
        assert!(msg.contains("Downtrend"));
    }

    #[tokio::test]
    async fn log_sink_always_accepts() {
        assert!(LogSink.deliver(&sample_signal(Direction::Bullish)).await.is_ok());
    }
}
