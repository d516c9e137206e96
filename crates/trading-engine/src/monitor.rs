use market_core::{
    CloseReason, Position, PositionCloseEvent, PositionUpdate, PriceTick, Side,
};
use tokio::sync::{broadcast, mpsc};

use crate::types::CloseCommand;

/// Watches one open position on the live price stream and closes it at
/// most once.
///
/// The monitor exclusively owns its position: nothing else mutates the
/// mark price or PnL, and the `Open -> Closed(reason)` transition can
/// only happen inside `run`. On every tick for the position's symbol the
/// PnL is recomputed and the close thresholds evaluated, stop-loss
/// first. A manual close request wins immediately with whatever PnL was
/// last computed.
pub struct PositionMonitor {
    position: Position,
    ticks: broadcast::Receiver<PriceTick>,
    commands: mpsc::Receiver<CloseCommand>,
    updates: broadcast::Sender<PositionUpdate>,
    last_price: f64,
    last_pnl: f64,
    stale: bool,
}

impl PositionMonitor {
    pub fn new(
        position: Position,
        ticks: broadcast::Receiver<PriceTick>,
        commands: mpsc::Receiver<CloseCommand>,
        updates: broadcast::Sender<PositionUpdate>,
    ) -> Self {
        let entry = position.entry_price;
        Self {
            position,
            ticks,
            commands,
            updates,
            last_price: entry,
            last_pnl: 0.0,
            stale: false,
        }
    }

    /// Run until the position closes, then return its terminal event.
    /// Dropping out of this function releases the tick subscription, so
    /// a closed position never observes another price.
    ///
    /// Returns `None` only if both input channels die while the position
    /// is still open; the caller logs that as a monitoring failure.
    pub async fn run(mut self) -> Option<PositionCloseEvent> {
        let mut commands_open = true;
        let mut ticks_open = true;

        loop {
            if !commands_open && !ticks_open {
                return None;
            }

            tokio::select! {
                cmd = self.commands.recv(), if commands_open => {
                    match cmd {
                        Some(CloseCommand) => return Some(self.close(CloseReason::Manual)),
                        // Control surface gone; thresholds keep working.
                        None => commands_open = false,
                    }
                }
                tick = self.ticks.recv(), if ticks_open => {
                    match tick {
                        Ok(tick) if tick.symbol == self.position.symbol => {
                            if let Some(reason) = self.apply_tick(tick.price) {
                                return Some(self.close(reason));
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "monitor for position {} lagged {} ticks",
                                self.position.id,
                                skipped
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            // The feed died under an open position. Flag
                            // staleness rather than silently idling; a
                            // manual close can still land.
                            tracing::warn!(
                                "price stream closed; position {} ({}) is stale",
                                self.position.id,
                                self.position.symbol
                            );
                            self.stale = true;
                            self.publish_update();
                            ticks_open = false;
                        }
                    }
                }
            }
        }
    }

    /// Recompute PnL for one price and decide whether to close.
    /// Stop-loss is evaluated before take-profit, so if both thresholds
    /// are somehow true on the same tick the loss exit wins.
    fn apply_tick(&mut self, price: f64) -> Option<CloseReason> {
        if !price.is_finite() || price <= 0.0 {
            // Malformed tick: keep last known state, stay subscribed.
            return None;
        }

        let entry = self.position.entry_price;
        let raw_pnl = match self.position.side {
            Side::Long => ((price - entry) / entry) * self.position.size,
            Side::Short => ((entry - price) / entry) * self.position.size,
        };
        let pnl_percent = (raw_pnl / self.position.margin) * 100.0;

        self.last_price = price;
        self.last_pnl = raw_pnl;

        if pnl_percent <= self.position.stop_loss_pct {
            return Some(CloseReason::StopLoss);
        }
        if pnl_percent >= self.position.take_profit_pct {
            return Some(CloseReason::TakeProfit);
        }

        self.publish_update();
        None
    }

    fn publish_update(&self) {
        let _ = self.updates.send(PositionUpdate {
            position_id: self.position.id,
            symbol: self.position.symbol.clone(),
            current_price: self.last_price,
            unrealized_pnl: self.last_pnl,
            pnl_percent: (self.last_pnl / self.position.margin) * 100.0,
            stale: self.stale,
        });
    }

    fn close(&self, reason: CloseReason) -> PositionCloseEvent {
        PositionCloseEvent {
            position_id: self.position.id,
            symbol: self.position.symbol.clone(),
            reason,
            realized_pnl: self.last_pnl,
            returned_margin: self.position.margin + self.last_pnl,
        }
    }
}
