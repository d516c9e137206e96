use thiserror::Error;

/// Recoverable error classes of the market pipeline. None of these should
/// ever terminate the process; each consumer has a documented fallback
/// (neutral indicators, dropped tick, resubscribe, rejected order).
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("Malformed tick: {0}")]
    MalformedTick(String),

    #[error("Stream disconnected: {0}")]
    StreamDisconnect(String),

    #[error("Invalid trade parameters: {0}")]
    InvalidTradeParameters(String),

    #[error("API error: {0}")]
    Api(String),
}
