// =============================================================================
// Central Application State — SMC Scanner
// =============================================================================
//
// Read-side view of the scanner for the status API. The scan driver owns the
// registry and the candle series; after every tick it publishes what it saw
// here. Nothing in AppState feeds back into signal generation.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
// =============================================================================

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::decision_envelope::DecisionEnvelope;
use crate::registry::{InstrumentSlots, OrderBlockCandidate};
use crate::runtime_config::{ScannerConfig, StrategyParams};
use crate::strategy::Signal;
use crate::types::Trend;

// =============================================================================
// Records
// =============================================================================

/// A recorded error event for the status error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Last known scan status of one instrument.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentStatus {
    pub symbol: String,
    pub trend: Trend,
    pub series_len: usize,
    /// Open time of the newest candle held, ms since epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_candle_time: Option<i64>,
    pub pending_zones: Vec<OrderBlockCandidate>,
    pub last_scan_at: String,
}

impl InstrumentStatus {
    pub fn new(
        symbol: impl Into<String>,
        trend: Trend,
        series_len: usize,
        latest_candle_time: Option<i64>,
        slots: &InstrumentSlots,
    ) -> Self {
        let pending_zones = [&slots.bullish, &slots.bearish]
            .into_iter()
            .filter_map(|s| s.candidate().cloned())
            .collect();
        Self {
            symbol: symbol.into(),
            trend,
            series_len,
            latest_candle_time,
            pending_zones,
            last_scan_at: Utc::now().to_rfc3339(),
        }
    }
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent signals to retain.
const MAX_RECENT_SIGNALS: usize = 100;
/// Maximum number of recent decisions to retain.
const MAX_RECENT_DECISIONS: usize = 200;
/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Shared across the scan driver and the API via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every mutation so pollers can detect changes.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    config: ScannerConfig,

    // ── Scan output ─────────────────────────────────────────────────────
    instruments: RwLock<BTreeMap<String, InstrumentStatus>>,
    recent_signals: RwLock<VecDeque<Signal>>,
    recent_decisions: RwLock<VecDeque<DecisionEnvelope>>,
    recent_errors: RwLock<VecDeque<ErrorRecord>>,
    ticks_completed: AtomicU64,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

fn push_capped<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    buf.push_back(item);
    while buf.len() > cap {
        buf.pop_front();
    }
}

impl AppState {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            config,
            instruments: RwLock::new(BTreeMap::new()),
            recent_signals: RwLock::new(VecDeque::new()),
            recent_decisions: RwLock::new(VecDeque::new()),
            recent_errors: RwLock::new(VecDeque::new()),
            ticks_completed: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Recording ───────────────────────────────────────────────────────

    pub fn push_signal(&self, signal: Signal) {
        push_capped(&mut self.recent_signals.write(), signal, MAX_RECENT_SIGNALS);
        self.increment_version();
    }

    pub fn push_decision(&self, envelope: DecisionEnvelope) {
        push_capped(
            &mut self.recent_decisions.write(),
            envelope,
            MAX_RECENT_DECISIONS,
        );
        self.increment_version();
    }

    /// Record an error, optionally attributed to one instrument.
    pub fn push_error(&self, message: String, symbol: Option<&str>) {
        let record = ErrorRecord {
            message,
            symbol: symbol.map(str::to_string),
            at: Utc::now().to_rfc3339(),
        };
        push_capped(&mut self.recent_errors.write(), record, MAX_RECENT_ERRORS);
        self.increment_version();
    }

    pub fn update_instrument(&self, status: InstrumentStatus) {
        self.instruments
            .write()
            .insert(status.symbol.clone(), status);
        self.increment_version();
    }

    pub fn complete_tick(&self) -> u64 {
        self.ticks_completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Most recent signals, newest first.
    pub fn recent_signals(&self) -> Vec<Signal> {
        self.recent_signals.read().iter().rev().cloned().collect()
    }

    /// Most recent decisions, newest first.
    pub fn recent_decisions(&self) -> Vec<DecisionEnvelope> {
        self.recent_decisions.read().iter().rev().cloned().collect()
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Serialisable snapshot served by `GET /api/v1/state`.
    pub fn build_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            ticks_completed: self.ticks_completed.load(Ordering::SeqCst),
            config: ConfigSummary {
                symbols: self.config.symbols.clone(),
                kline_interval: self.config.kline_interval.clone(),
                scan_interval_secs: self.config.scan_interval_secs,
                series_capacity: self.config.series_capacity,
                telegram_enabled: self.config.telegram_bot_token.is_some()
                    && self.config.telegram_chat_id.is_some(),
                strategy_params: self.config.strategy_params.clone(),
            },
            instruments: self.instruments.read().values().cloned().collect(),
            recent_signals: self.recent_signals.read().iter().cloned().collect(),
            recent_decisions: self.recent_decisions.read().iter().cloned().collect(),
            recent_errors: self.recent_errors.read().iter().cloned().collect(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub ticks_completed: u64,
    pub config: ConfigSummary,
    pub instruments: Vec<InstrumentStatus>,
    pub recent_signals: Vec<Signal>,
    pub recent_decisions: Vec<DecisionEnvelope>,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Config as shown to operators; credentials are never included.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub symbols: Vec<String>,
    pub kline_interval: String,
    pub scan_interval_secs: u64,
    pub series_capacity: usize,
    pub telegram_enabled: bool,
    pub strategy_params: StrategyParams,
}
