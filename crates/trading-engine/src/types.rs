use market_core::Side;

/// Parameters for opening a simulated position. The execution layer has
/// already decided the margin is affordable before building one of these.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub leverage: u32,
    pub margin: f64,
    /// Close threshold on PnL percent of margin, negative (e.g. -3.0).
    pub stop_loss_pct: f64,
    /// Close threshold on PnL percent of margin, positive (e.g. 12.0).
    pub take_profit_pct: f64,
}

/// Manual close request delivered to a position monitor.
#[derive(Debug, Clone, Copy)]
pub struct CloseCommand;
