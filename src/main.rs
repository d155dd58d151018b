// =============================================================================
// SMC Scanner — Main Entry Point
// =============================================================================
//
// Scans the configured instruments on a fixed cadence for order block setups
// confirmed by BOS, FVG and trend, and posts each setup once. Signals only:
// the scanner never places orders.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod binance;
mod decision_envelope;
mod error;
mod indicators;
mod market_data;
mod notify;
mod registry;
mod runtime_config;
mod scanner;
mod strategy;
mod structure;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::binance::BinanceClient;
use crate::notify::{LogSink, SignalSink, TelegramSink};
use crate::runtime_config::ScannerConfig;
use crate::scanner::Scanner;
use crate::strategy::ConfluenceEvaluator;

const DEFAULT_CONFIG_PATH: &str = "scanner_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        SMC Order Block Scanner — Starting Up             ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path = std::env::var("SMC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    // A missing file means defaults; a broken one must stop startup.
    let mut config = if config_path.exists() {
        ScannerConfig::load(&config_path)?
    } else {
        warn!(path = %config_path.display(), "config file not found, using defaults");
        ScannerConfig::default()
    };
    config.apply_env(|key| std::env::var(key).ok());
    config.validate().context("invalid scanner configuration")?;

    info!(
        symbols = ?config.symbols,
        interval = %config.kline_interval,
        scan_every_secs = config.scan_interval_secs,
        trend = %config.strategy_params.ma_kind,
        fast = config.strategy_params.fast_period,
        slow = config.strategy_params.slow_period,
        "configuration ready"
    );

    // ── 2. Signal sink ───────────────────────────────────────────────────
    let sink: Arc<dyn SignalSink> = match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            info!("signals will be posted to telegram");
            Arc::new(TelegramSink::new(token.clone(), chat_id.clone())?)
        }
        _ => {
            warn!("telegram credentials missing, signals will only be logged");
            Arc::new(LogSink)
        }
    };

    // ── 3. Candle source ─────────────────────────────────────────────────
    let fetch_limit = u32::try_from(config.series_capacity).unwrap_or(u32::MAX);
    let source = Arc::new(BinanceClient::new(
        config.kline_interval.clone(),
        fetch_limit,
    )?);

    // ── 4. Shared state ──────────────────────────────────────────────────
    let state = Arc::new(AppState::new(config.clone()));

    // ── 5. Status API ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind status API on {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "status API listening");

    let app = api::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "status API server stopped");
        }
    });

    // ── 6. Scan loop ─────────────────────────────────────────────────────
    let scanner = Scanner::new(
        config.symbols.clone(),
        config.series_capacity,
        ConfluenceEvaluator::new(config.strategy_params.clone()),
        source,
        sink,
        state.clone(),
    );
    let scan_task = tokio::spawn(scanner.run(config.scan_interval()));

    info!("scanner running. Press Ctrl+C to stop.");

    // ── 7. Shutdown ──────────────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping");
    scan_task.abort();

    info!(
        state_version = state.current_state_version(),
        "SMC scanner shut down complete."
    );
    Ok(())
}
