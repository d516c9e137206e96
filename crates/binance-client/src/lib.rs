use std::time::Duration;

use market_core::{Candle, MarketError};
use reqwest::Client;
use serde_json::Value;

pub mod websocket;

pub use websocket::BinanceWebSocket;

pub const DEFAULT_REST_URL: &str = "https://api.binance.com";

/// Thin REST client for the public market-data endpoints. Only used to
/// seed rolling series before the live stream takes over, so every
/// failure here is tolerable: callers start with an empty series.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetch the most recent klines for a symbol, oldest first. Retries
    /// transient failures with a short back-off before giving up.
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketError> {
        let url = format!("{}/api/v3/klines", self.base_url);

        let mut last_err = MarketError::Api("kline fetch not attempted".to_string());
        for attempt in 0..3u32 {
            match self.try_fetch(&url, symbol, interval, limit).await {
                Ok(candles) => return Ok(candles),
                Err(e) => {
                    tracing::warn!(
                        "kline fetch for {} failed (attempt {}/3): {}",
                        symbol,
                        attempt + 1,
                        e
                    );
                    last_err = e;
                }
            }
            if attempt + 1 < 3 {
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
        }
        Err(last_err)
    }

    async fn try_fetch(
        &self,
        url: &str,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketError> {
        let limit_param = limit.to_string();
        let response = self
            .client
            .get(url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MarketError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketError::Api(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let rows: Vec<Vec<Value>> = response
            .json()
            .await
            .map_err(|e| MarketError::Api(e.to_string()))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            match parse_kline_row(row) {
                Ok(candle) => candles.push(candle),
                // Drop the bad row, keep the rest of the batch.
                Err(e) => tracing::debug!("{}: {}", symbol, e),
            }
        }
        Ok(candles)
    }
}

/// One kline row is a heterogeneous array:
/// `[openTime, open, high, low, close, volume, ...]` with the prices
/// string-encoded.
fn parse_kline_row(row: &[Value]) -> Result<Candle, MarketError> {
    let field = |i: usize| {
        parse_price(&row[i])
            .ok_or_else(|| MarketError::MalformedTick(format!("kline field {i} unparsable")))
    };
    if row.len() < 6 {
        return Err(MarketError::MalformedTick(format!(
            "kline row has {} fields, expected 6+",
            row.len()
        )));
    }
    Ok(Candle {
        open_time: row[0]
            .as_i64()
            .ok_or_else(|| MarketError::MalformedTick("kline open time unparsable".into()))?,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

/// Binance encodes most numbers as strings; accept either form and
/// reject anything non-finite.
pub(crate) fn parse_price(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}
