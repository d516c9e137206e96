use std::collections::HashSet;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use market_core::{Candle, CandleUpdate, MarketError, PriceTick};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::parse_price;

pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443";

/// Combined-stream WebSocket feed: one connection carrying a
/// `@miniTicker` (last price) and a `@kline_1m` (bar) channel per
/// subscribed symbol. Parsed events fan out over broadcast channels;
/// malformed payloads are dropped without disturbing the subscription.
pub struct BinanceWebSocket {
    base_url: String,
    tick_tx: broadcast::Sender<PriceTick>,
    candle_tx: broadcast::Sender<CandleUpdate>,
    subscriptions: Arc<Mutex<HashSet<String>>>,
    shutdown: Arc<Notify>,
}

impl BinanceWebSocket {
    pub fn new(base_url: impl Into<String>) -> Self {
        let (tick_tx, _) = broadcast::channel(1024);
        let (candle_tx, _) = broadcast::channel(1024);
        Self {
            base_url: base_url.into(),
            tick_tx,
            candle_tx,
            subscriptions: Arc::new(Mutex::new(HashSet::new())),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// New receiver for last-price updates.
    pub fn ticks(&self) -> broadcast::Receiver<PriceTick> {
        self.tick_tx.subscribe()
    }

    /// New receiver for completed candles.
    pub fn candles(&self) -> broadcast::Receiver<CandleUpdate> {
        self.candle_tx.subscribe()
    }

    pub fn tick_sender(&self) -> broadcast::Sender<PriceTick> {
        self.tick_tx.clone()
    }

    pub async fn subscribe(&self, symbols: &[String]) {
        let mut subs = self.subscriptions.lock().await;
        for symbol in symbols {
            subs.insert(symbol.to_lowercase());
        }
    }

    pub async fn unsubscribe(&self, symbols: &[String]) {
        let mut subs = self.subscriptions.lock().await;
        for symbol in symbols {
            subs.remove(&symbol.to_lowercase());
        }
    }

    /// Request a prompt close of the connection. Safe to call more than
    /// once; closing an already-closed feed is a no-op.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Connect and stream until shutdown, reconnecting after transient
    /// failures. A dropped connection is recoverable by design: the
    /// series stores and monitors ride out the gap and resume on the
    /// next successful connect.
    pub async fn run(&self) {
        loop {
            match self.connect_and_stream().await {
                Ok(()) => {
                    tracing::info!("Binance stream shut down");
                    return;
                }
                Err(e) => {
                    tracing::warn!("Binance stream error: {}, reconnecting in 5s", e);
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {}
                        _ = self.shutdown.notified() => {
                            tracing::info!("Binance stream shutdown requested");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn connect_and_stream(&self) -> Result<(), MarketError> {
        let channels: Vec<String> = {
            let subs = self.subscriptions.lock().await;
            subs.iter()
                .flat_map(|s| [format!("{s}@miniTicker"), format!("{s}@kline_1m")])
                .collect()
        };
        if channels.is_empty() {
            return Err(MarketError::StreamDisconnect(
                "no stream subscriptions configured".to_string(),
            ));
        }

        let url = format!("{}/stream?streams={}", self.base_url, channels.join("/"));
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| MarketError::StreamDisconnect(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        tracing::info!("Connected to Binance stream ({} channels)", channels.len());

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_message(&text);
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(MarketError::StreamDisconnect(
                                "server closed the connection".to_string(),
                            ));
                        }
                        Some(Err(e)) => {
                            return Err(MarketError::StreamDisconnect(e.to_string()));
                        }
                        _ => {}
                    }
                }
                _ = self.shutdown.notified() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }

    /// Combined-stream payloads wrap each event as
    /// `{"stream": "...", "data": {...}}`.
    fn handle_message(&self, text: &str) {
        let Ok(envelope) = serde_json::from_str::<Value>(text) else {
            tracing::debug!("dropping undecodable stream payload");
            return;
        };
        let Some(data) = envelope.get("data") else {
            return;
        };

        match data.get("e").and_then(Value::as_str) {
            Some("24hrMiniTicker") => {
                let (Some(symbol), Some(price), Some(timestamp)) = (
                    data.get("s").and_then(Value::as_str),
                    data.get("c").and_then(parse_price),
                    data.get("E").and_then(Value::as_i64),
                ) else {
                    tracing::debug!("dropping malformed mini-ticker event");
                    return;
                };
                let _ = self.tick_tx.send(PriceTick {
                    symbol: symbol.to_string(),
                    price,
                    timestamp,
                });
            }
            Some("kline") => {
                let Some(kline) = data.get("k") else {
                    return;
                };
                // Only completed bars enter a series.
                if !kline.get("x").and_then(Value::as_bool).unwrap_or(false) {
                    return;
                }
                let (Some(symbol), Some(open_time)) = (
                    data.get("s").and_then(Value::as_str),
                    kline.get("t").and_then(Value::as_i64),
                ) else {
                    tracing::debug!("dropping malformed kline event");
                    return;
                };
                let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
                    kline.get("o").and_then(parse_price),
                    kline.get("h").and_then(parse_price),
                    kline.get("l").and_then(parse_price),
                    kline.get("c").and_then(parse_price),
                    kline.get("v").and_then(parse_price),
                ) else {
                    tracing::debug!("dropping malformed kline event");
                    return;
                };
                let _ = self.candle_tx.send(CandleUpdate {
                    symbol: symbol.to_string(),
                    candle: Candle {
                        open_time,
                        open,
                        high,
                        low,
                        close,
                        volume,
                    },
                });
            }
            _ => {}
        }
    }
}
