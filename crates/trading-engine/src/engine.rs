use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use market_core::{
    MarketError, Position, PositionCloseEvent, PositionUpdate, PriceTick, Signal,
};
use tokio::sync::{broadcast, mpsc};

use crate::calculator::compute_trade;
use crate::monitor::PositionMonitor;
use crate::types::{CloseCommand, OpenRequest};

struct PositionHandle {
    symbol: String,
    close_tx: mpsc::Sender<CloseCommand>,
}

/// Owns the set of open positions and spawns one monitor task per
/// position. Ownership is partitioned: each monitor has exclusive access
/// to its position, and the registry only holds enough to route manual
/// close requests. The engine never reads or writes balance state; the
/// execution layer decided affordability before calling in.
pub struct TradingEngine {
    ticks: broadcast::Sender<PriceTick>,
    closes: mpsc::Sender<PositionCloseEvent>,
    updates: broadcast::Sender<PositionUpdate>,
    open_positions: Arc<DashMap<u64, PositionHandle>>,
    next_id: AtomicU64,
    max_open_positions: usize,
}

impl TradingEngine {
    pub fn new(
        ticks: broadcast::Sender<PriceTick>,
        closes: mpsc::Sender<PositionCloseEvent>,
        max_open_positions: usize,
    ) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            ticks,
            closes,
            updates,
            open_positions: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            max_open_positions,
        }
    }

    /// New receiver for live mark-to-market updates.
    pub fn updates(&self) -> broadcast::Receiver<PositionUpdate> {
        self.updates.subscribe()
    }

    pub fn open_count(&self) -> usize {
        self.open_positions.len()
    }

    pub fn open_symbols(&self) -> Vec<(u64, String)> {
        self.open_positions
            .iter()
            .map(|entry| (*entry.key(), entry.value().symbol.clone()))
            .collect()
    }

    /// Open a simulated position and start monitoring it. The position
    /// leaves the open set the instant its monitor emits the close
    /// event.
    pub fn open_position(&self, request: OpenRequest) -> Result<Position, MarketError> {
        if self.open_positions.len() >= self.max_open_positions {
            return Err(MarketError::InvalidTradeParameters(format!(
                "open position limit ({}) reached",
                self.max_open_positions
            )));
        }

        let plan = compute_trade(
            request.entry_price,
            request.leverage,
            request.margin,
            request.side,
        )?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let position = Position {
            id,
            symbol: request.symbol.clone(),
            side: request.side,
            entry_price: request.entry_price,
            leverage: request.leverage,
            margin: request.margin,
            size: plan.size,
            liquidation_price: plan.liquidation_price,
            stop_loss_pct: request.stop_loss_pct,
            take_profit_pct: request.take_profit_pct,
            opened_at: Utc::now(),
        };

        let (close_tx, close_rx) = mpsc::channel(1);
        let monitor = PositionMonitor::new(
            position.clone(),
            self.ticks.subscribe(),
            close_rx,
            self.updates.clone(),
        );

        self.open_positions.insert(
            id,
            PositionHandle {
                symbol: position.symbol.clone(),
                close_tx,
            },
        );

        let registry = Arc::clone(&self.open_positions);
        let closes = self.closes.clone();
        tokio::spawn(async move {
            let event = monitor.run().await;
            // Out of the open set before the sink hears about it.
            registry.remove(&id);
            match event {
                Some(event) => {
                    let _ = closes.send(event).await;
                }
                None => {
                    tracing::warn!("monitor for position {} ended without a close event", id)
                }
            }
        });

        tracing::info!(
            "Opened position {}: {} {} x{} margin ${:.2}, size ${:.2}, liq ${:.2}",
            position.id,
            position.side.label(),
            position.symbol,
            position.leverage,
            position.margin,
            position.size,
            position.liquidation_price
        );
        Ok(position)
    }

    /// Convert an accepted signal into a position with the given sizing.
    ///
    /// The signal's price brackets become PnL-percent thresholds scaled
    /// by leverage, so the position closes exactly when its stop or
    /// take price trades.
    pub fn open_from_signal(
        &self,
        signal: &Signal,
        margin: f64,
        leverage: u32,
    ) -> Result<Position, MarketError> {
        let entry = signal.entry_price;
        if !entry.is_finite() || entry <= 0.0 {
            return Err(MarketError::InvalidTradeParameters(format!(
                "signal entry price {entry} is not tradable"
            )));
        }

        let lev = leverage as f64;
        let stop_loss_pct = -((signal.stop_loss_price - entry).abs() / entry) * lev * 100.0;
        let take_profit_pct = ((signal.take_profit_price - entry).abs() / entry) * lev * 100.0;

        self.open_position(OpenRequest {
            symbol: signal.symbol.clone(),
            side: signal.direction.side(),
            entry_price: entry,
            leverage,
            margin,
            stop_loss_pct,
            take_profit_pct,
        })
    }

    /// Request a manual close. Returns false for an unknown or
    /// already-closed position; repeating a close is a harmless no-op.
    pub async fn close_position(&self, id: u64) -> bool {
        let close_tx = match self.open_positions.get(&id) {
            Some(handle) => handle.close_tx.clone(),
            None => return false,
        };
        close_tx.send(CloseCommand).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use market_core::{CloseReason, Direction, Side};

    fn engine() -> (
        TradingEngine,
        broadcast::Sender<PriceTick>,
        mpsc::Receiver<PositionCloseEvent>,
    ) {
        let (tick_tx, _) = broadcast::channel(64);
        let (close_tx, close_rx) = mpsc::channel(16);
        let engine = TradingEngine::new(tick_tx.clone(), close_tx, 5);
        (engine, tick_tx, close_rx)
    }

    fn request() -> OpenRequest {
        OpenRequest {
            symbol: "BTCUSDT".to_string(),
            side: Side::Long,
            entry_price: 100.0,
            leverage: 10,
            margin: 100.0,
            stop_loss_pct: -3.0,
            take_profit_pct: 12.0,
        }
    }

    #[tokio::test]
    async fn manual_close_round_trip() {
        let (engine, _ticks, mut closes) = engine();
        let position = engine.open_position(request()).unwrap();
        assert_eq!(position.size, 1_000.0);
        assert_eq!(engine.open_count(), 1);

        assert!(engine.close_position(position.id).await);
        let event = closes.recv().await.expect("close event");

        assert_eq!(event.position_id, position.id);
        assert_eq!(event.reason, CloseReason::Manual);
        assert_eq!(event.returned_margin, 100.0);
        // Removal happens before the event is forwarded.
        assert_eq!(engine.open_count(), 0);

        // Closing again is a no-op, not an error.
        assert!(!engine.close_position(position.id).await);
    }

    #[tokio::test]
    async fn stop_loss_tick_closes_through_the_engine() {
        let (engine, ticks, mut closes) = engine();
        let position = engine.open_position(request()).unwrap();

        ticks
            .send(PriceTick {
                symbol: "BTCUSDT".to_string(),
                price: 99.0,
                timestamp: 0,
            })
            .unwrap();

        let event = closes.recv().await.expect("close event");
        assert_eq!(event.position_id, position.id);
        assert_eq!(event.reason, CloseReason::StopLoss);
        assert_eq!(event.realized_pnl, -10.0);
        assert_eq!(event.returned_margin, 90.0);
    }

    #[tokio::test]
    async fn enforces_the_open_position_limit() {
        let (tick_tx, _) = broadcast::channel(64);
        let (close_tx, _close_rx) = mpsc::channel(16);
        let engine = TradingEngine::new(tick_tx, close_tx, 1);

        engine.open_position(request()).unwrap();
        let err = engine.open_position(request()).unwrap_err();
        assert!(matches!(err, MarketError::InvalidTradeParameters(_)));
    }

    #[tokio::test]
    async fn rejects_invalid_parameters_without_spawning() {
        let (engine, _ticks, _closes) = engine();
        let mut bad = request();
        bad.leverage = 0;
        assert!(engine.open_position(bad).is_err());
        assert_eq!(engine.open_count(), 0);
    }

    #[tokio::test]
    async fn signal_brackets_become_leveraged_thresholds() {
        let (engine, _ticks, _closes) = engine();
        let signal = Signal {
            symbol: "ETHUSDT".to_string(),
            direction: Direction::Buy,
            strength: 80.0,
            entry_price: 100.0,
            stop_loss_price: 99.0,
            take_profit_price: 105.0,
            reasons: vec!["RSI Oversold (25.0)".to_string()],
            risk_tier: "Conservative".to_string(),
            created_at: Utc::now(),
        };

        let position = engine.open_from_signal(&signal, 1_000.0, 10).unwrap();
        assert_eq!(position.side, Side::Long);
        assert_eq!(position.size, 10_000.0);
        // 1% price stop at 10x leverage = -10% of margin.
        assert!((position.stop_loss_pct - -10.0).abs() < 1e-9);
        assert!((position.take_profit_pct - 50.0).abs() < 1e-9);
    }
}
