// =============================================================================
// Scan Driver — periodic multi-instrument scan loop
// =============================================================================
//
// One task owns every candle series and the order block registry, so no
// locking is needed on the hot path. Each tick:
//
//   1. Fetch all instruments concurrently
//   2. Merge each batch into its series (stale overlap is skipped)
//   3. Evaluate instruments that gained at least one closed candle, in
//      configured order
//   4. Hand fired signals to the sink; publish decisions and status
//
// A failed fetch skips that instrument for this tick only. A failed delivery
// is logged; the zone stays consumed (at-most-once).
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::app_state::{AppState, InstrumentStatus};
use crate::decision_envelope::DecisionEnvelope;
use crate::market_data::{CandleSeries, CandleSource};
use crate::notify::SignalSink;
use crate::registry::OrderBlockRegistry;
use crate::strategy::{ConfluenceEvaluator, ScanReport, Signal};

/// What one tick did across all instruments.
#[derive(Debug, Default)]
pub struct TickSummary {
    pub reports: Vec<ScanReport>,
    pub signals: Vec<Signal>,
    pub fetch_failures: usize,
    pub delivery_failures: usize,
    /// Instruments that still hold no closed candle after this tick.
    pub empty_instruments: usize,
}

pub struct Scanner {
    symbols: Vec<String>,
    capacity: usize,
    evaluator: ConfluenceEvaluator,
    source: Arc<dyn CandleSource>,
    sink: Arc<dyn SignalSink>,
    state: Arc<AppState>,
    registry: OrderBlockRegistry,
    series: HashMap<String, CandleSeries>,
}

impl Scanner {
    pub fn new(
        symbols: Vec<String>,
        capacity: usize,
        evaluator: ConfluenceEvaluator,
        source: Arc<dyn CandleSource>,
        sink: Arc<dyn SignalSink>,
        state: Arc<AppState>,
    ) -> Self {
        Self {
            symbols,
            capacity,
            evaluator,
            source,
            sink,
            state,
            registry: OrderBlockRegistry::new(),
            series: HashMap::new(),
        }
    }

    /// Run ticks forever, one every `period`. The first tick fires
    /// immediately; a slow tick delays the next one instead of overlapping.
    pub async fn run(mut self, period: Duration) {
        info!(
            symbols = ?self.symbols,
            period_secs = period.as_secs(),
            "scan loop starting"
        );

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick(Utc::now()).await;
        }
    }

    /// Fetch, ingest and evaluate every instrument once.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::default();

        let source = &self.source;
        let fetched = join_all(self.symbols.iter().map(|symbol| async move {
            (symbol.clone(), source.fetch(symbol).await)
        }))
        .await;

        for (symbol, result) in fetched {
            let batch = match result {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "candle fetch failed, skipping this tick");
                    self.state.push_error(e.to_string(), Some(&symbol));
                    summary.fetch_failures += 1;
                    continue;
                }
            };

            let capacity = self.capacity;
            let series = self
                .series
                .entry(symbol.clone())
                .or_insert_with(|| CandleSeries::new(symbol.clone(), capacity));

            let ingest = series.ingest(batch);
            if ingest.rejected > 0 {
                warn!(
                    symbol = %symbol,
                    rejected = ingest.rejected,
                    "out-of-order candles rejected"
                );
            }
            if ingest.appended == 0 {
                if series.is_empty() {
                    warn!(symbol = %symbol, "no closed candles received yet");
                    summary.empty_instruments += 1;
                } else {
                    debug!(symbol = %symbol, stale = ingest.stale, "no new closed candle");
                }
                continue;
            }

            let slots = self.registry.slots_mut(&symbol);
            let report = self.evaluator.evaluate(series, slots, now);
            debug!(
                symbol = %symbol,
                trend = %report.trend,
                verdict = ?report.verdict,
                pending = slots.pending_count(),
                "instrument evaluated"
            );

            for envelope in DecisionEnvelope::from_report(&report) {
                self.state.push_decision(envelope);
            }
            self.state.update_instrument(InstrumentStatus::new(
                symbol.as_str(),
                report.trend,
                series.len(),
                series.latest().map(|c| c.open_time),
                slots,
            ));

            summary.signals.extend(report.signals().cloned());
            summary.reports.push(report);
        }

        for signal in &summary.signals {
            self.state.push_signal(signal.clone());
            if let Err(e) = self.sink.deliver(signal).await {
                warn!(
                    symbol = %signal.instrument,
                    id = %signal.id,
                    error = %e,
                    "signal delivery failed; zone stays consumed"
                );
                self.state.push_error(e.to_string(), Some(&signal.instrument));
                summary.delivery_failures += 1;
            }
        }

        let tick = self.state.complete_tick();
        info!(
            tick,
            evaluated = summary.reports.len(),
            signals = summary.signals.len(),
            fetch_failures = summary.fetch_failures,
            delivery_failures = summary.delivery_failures,
            empty_instruments = summary.empty_instruments,
            pending_zones = self.registry.pending().count(),
            "scan tick complete"
        );

        summary
    }
}
