use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle. Immutable once produced by the stream adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, epoch milliseconds.
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Last-price update from the mini-ticker stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: f64,
    /// Event time, epoch milliseconds.
    pub timestamp: i64,
}

/// A completed candle tagged with its symbol, as delivered by the kline
/// stream. In-progress bars never become a `CandleUpdate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleUpdate {
    pub symbol: String,
    pub candle: Candle,
}

/// Trade direction of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn side(&self) -> Side {
        match self {
            Direction::Buy => Side::Long,
            Direction::Sell => Side::Short,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

/// A scored, directional trade recommendation. Immutable; it is either
/// discarded or converted into a `Position` by the execution layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    /// Confidence score in [0, 100].
    pub strength: f64,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    /// Indicator statements that contributed, in evaluation order.
    pub reasons: Vec<String>,
    pub risk_tier: String,
    pub created_at: DateTime<Utc>,
}

/// A simulated leveraged trade. Owned exclusively by its monitor task
/// from creation until the close event fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub leverage: u32,
    pub margin: f64,
    /// margin x leverage.
    pub size: f64,
    pub liquidation_price: f64,
    /// Close threshold on PnL percent of margin; negative (e.g. -3.0).
    pub stop_loss_pct: f64,
    /// Close threshold on PnL percent of margin; positive (e.g. 12.0).
    pub take_profit_pct: f64,
    pub opened_at: DateTime<Utc>,
}

/// Why a position left the `Open` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    Manual,
}

impl CloseReason {
    pub fn label(&self) -> &'static str {
        match self {
            CloseReason::StopLoss => "Stop Loss",
            CloseReason::TakeProfit => "Take Profit",
            CloseReason::Manual => "Manual Close",
        }
    }
}

/// Terminal event of a position. Emitted exactly once per position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionCloseEvent {
    pub position_id: u64,
    pub symbol: String,
    pub reason: CloseReason,
    pub realized_pnl: f64,
    /// margin + realized_pnl, what the ledger hands back to the balance.
    pub returned_margin: f64,
}

/// Live mark-to-market snapshot published while a position stays open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub position_id: u64,
    pub symbol: String,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub pnl_percent: f64,
    /// True when the price feed dropped and the numbers may be behind.
    pub stale: bool,
}
