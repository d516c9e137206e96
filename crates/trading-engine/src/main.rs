use std::sync::Arc;

use anyhow::{Context, Result};
use binance_client::{BinanceClient, BinanceWebSocket};
use market_core::{PositionCloseEvent, Signal};
use signal_engine::{RiskTier, ScoringStrategy};
use tokio::signal::unix::SignalKind;
use tokio::sync::{broadcast, mpsc};

mod calculator;
mod config;
mod engine;
mod ingest;
mod monitor;
mod types;

use config::EngineConfig;
use engine::TradingEngine;
use ingest::SeriesIngestor;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting PulseTrader engine");

    // 2. Load configuration
    let config = EngineConfig::from_env()?;
    let tier = *RiskTier::by_name(&config.risk_tier)
        .with_context(|| format!("unknown risk tier '{}'", config.risk_tier))?;
    let strategy = ScoringStrategy::parse(&config.strategy)
        .with_context(|| format!("unknown scoring strategy '{}'", config.strategy))?;

    tracing::info!("Configuration loaded");
    tracing::info!("  Assets: {}", config.assets.join(", "));
    tracing::info!(
        "  Risk tier: {} (stop {:.1}%, take {:.1}%, min strength {:.0})",
        tier.name,
        tier.stop_loss_pct,
        tier.take_profit_pct,
        tier.min_strength
    );
    tracing::info!("  Strategy: {:?}", strategy);
    tracing::info!(
        "  Sizing: x{} leverage, ${} margin, max {} open positions",
        config.default_leverage,
        config.default_margin,
        config.max_open_positions
    );
    tracing::info!("  Auto-execute: {}", config.auto_execute);

    // 3. Market data plumbing: one combined stream, fanned out to the
    // ingestion tasks and position monitors.
    let rest = BinanceClient::new(config.rest_url.clone());
    let ws = Arc::new(BinanceWebSocket::new(config.ws_url.clone()));
    ws.subscribe(&config.assets).await;

    let (signal_tx, mut signal_rx) = mpsc::channel::<Signal>(64);
    let (close_tx, mut close_rx) = mpsc::channel::<PositionCloseEvent>(64);

    let engine = Arc::new(TradingEngine::new(
        ws.tick_sender(),
        close_tx,
        config.max_open_positions,
    ));

    // 4. One ingestion task per symbol, seeded with recent history. A
    // failed seed just means that symbol starts empty and warms up from
    // the live stream.
    for symbol in &config.assets {
        let mut ingestor = SeriesIngestor::new(
            symbol.clone(),
            config.series_capacity,
            config.min_candles,
            tier,
            strategy,
            ws.candles(),
            signal_tx.clone(),
        );
        match rest
            .fetch_klines(symbol, &config.kline_interval, config.seed_candles)
            .await
        {
            Ok(history) => ingestor.seed(&history),
            Err(e) => {
                tracing::warn!("{}: historical seed failed ({}), starting empty", symbol, e)
            }
        }
        tokio::spawn(ingestor.run());
    }
    drop(signal_tx);

    let ws_task = {
        let ws = Arc::clone(&ws);
        tokio::spawn(async move { ws.run().await })
    };

    // 5. Signal sink: log every accepted signal, optionally convert it
    // into a position. Whether the margin is affordable is this layer's
    // call, not the engine's; the simulation funds every signal.
    {
        let engine = Arc::clone(&engine);
        let auto_execute = config.auto_execute;
        let margin = config.default_margin;
        let leverage = config.default_leverage;
        tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                tracing::info!(
                    "Signal: {} {} @ ${:.2} (strength {:.0}, stop ${:.2}, take ${:.2}) [{}]",
                    signal.direction.label(),
                    signal.symbol,
                    signal.entry_price,
                    signal.strength,
                    signal.stop_loss_price,
                    signal.take_profit_price,
                    signal.reasons.join(", ")
                );
                if auto_execute {
                    match engine.open_from_signal(&signal, margin, leverage) {
                        Ok(position) => tracing::info!(
                            "Auto-executed into position {} ({} {})",
                            position.id,
                            position.side.label(),
                            position.symbol
                        ),
                        Err(e) => tracing::warn!("Signal not executed: {}", e),
                    }
                }
            }
        });
    }

    // 6. Position sink: the ledger collaborator. The engine already
    // removed the position; this side only accounts for the outcome.
    tokio::spawn(async move {
        while let Some(event) = close_rx.recv().await {
            tracing::info!(
                "Position {} ({}) closed: {}, PnL ${:+.2}, margin returned ${:.2}",
                event.position_id,
                event.symbol,
                event.reason.label(),
                event.realized_pnl,
                event.returned_margin
            );
        }
    });

    // 7. Mark-to-market updates at debug level.
    {
        let mut updates = engine.updates();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(update) => tracing::debug!(
                        "position {}: ${:.2}, PnL ${:+.2} ({:+.2}%){}",
                        update.position_id,
                        update.current_price,
                        update.unrealized_pnl,
                        update.pnl_percent,
                        if update.stale { " [stale]" } else { "" }
                    ),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    tracing::info!(
        "Engine running: scanning {} symbols on the {} stream. Press Ctrl+C to stop.",
        config.assets.len(),
        config.kline_interval
    );

    // Graceful shutdown on SIGINT + SIGTERM
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }

    // Close any positions still open so the ledger hears a final event
    // for each, then release the stream.
    if engine.open_count() > 0 {
        tracing::info!("Closing {} open positions", engine.open_count());
    }
    for (id, symbol) in engine.open_symbols() {
        tracing::info!("Closing open position {} ({}) on shutdown", id, symbol);
        engine.close_position(id).await;
    }

    ws.shutdown();
    let _ = ws_task.await;
    tracing::info!("Shutdown complete");
    Ok(())
}
