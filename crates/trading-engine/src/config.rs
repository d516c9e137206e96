use std::env;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Symbols scanned for signals.
    pub assets: Vec<String>,

    /// Rolling window capacity per symbol.
    pub series_capacity: usize,
    /// Candles requested from the historical seed fetch.
    pub seed_candles: u32,
    /// Kline interval for both the seed and the live stream.
    pub kline_interval: String,
    /// Minimum candles before the scanner scores a symbol.
    pub min_candles: usize,

    /// Risk tier name (conservative / moderate / aggressive).
    pub risk_tier: String,
    /// Scoring strategy name (weighted / band_touch).
    pub strategy: String,

    /// Sizing applied when a signal is auto-executed.
    pub default_leverage: u32,
    pub default_margin: f64,
    pub max_open_positions: usize,
    /// Convert accepted signals into positions without operator action.
    pub auto_execute: bool,

    /// PnL-percent close thresholds for positions opened without a
    /// signal bracket.
    pub manual_stop_loss_pct: f64,
    pub manual_take_profit_pct: f64,

    // Endpoints
    pub rest_url: String,
    pub ws_url: String,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            assets: env::var("ASSETS")
                .unwrap_or_else(|_| {
                    "BTCUSDT,ETHUSDT,SOLUSDT,DOGEUSDT,XRPUSDT,BNBUSDT".to_string()
                })
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),

            series_capacity: env::var("SERIES_CAPACITY")
                .unwrap_or_else(|_| "200".to_string())
                .parse()?,
            seed_candles: env::var("SEED_CANDLES")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            kline_interval: env::var("KLINE_INTERVAL").unwrap_or_else(|_| "1m".to_string()),
            min_candles: env::var("MIN_CANDLES")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,

            risk_tier: env::var("RISK_TIER").unwrap_or_else(|_| "conservative".to_string()),
            strategy: env::var("SCORING_STRATEGY").unwrap_or_else(|_| "weighted".to_string()),

            default_leverage: env::var("DEFAULT_LEVERAGE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            default_margin: env::var("DEFAULT_MARGIN")
                .unwrap_or_else(|_| "1000.0".to_string())
                .parse()?,
            max_open_positions: env::var("MAX_OPEN_POSITIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            auto_execute: env::var("AUTO_EXECUTE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,

            manual_stop_loss_pct: env::var("MANUAL_STOP_LOSS_PCT")
                .unwrap_or_else(|_| "-3.0".to_string())
                .parse()?,
            manual_take_profit_pct: env::var("MANUAL_TAKE_PROFIT_PCT")
                .unwrap_or_else(|_| "12.0".to_string())
                .parse()?,

            rest_url: env::var("BINANCE_REST_URL")
                .unwrap_or_else(|_| binance_client::DEFAULT_REST_URL.to_string()),
            ws_url: env::var("BINANCE_WS_URL")
                .unwrap_or_else(|_| binance_client::websocket::DEFAULT_WS_URL.to_string()),
        };

        anyhow::ensure!(!config.assets.is_empty(), "ASSETS resolved to an empty list");
        anyhow::ensure!(
            config.manual_stop_loss_pct < 0.0,
            "MANUAL_STOP_LOSS_PCT must be negative"
        );
        anyhow::ensure!(
            config.manual_take_profit_pct > 0.0,
            "MANUAL_TAKE_PROFIT_PCT must be positive"
        );

        Ok(config)
    }
}
