use market_core::{Candle, CandleUpdate, PriceSeries, Signal};
use signal_engine::{analyze_market, RiskTier, ScoringStrategy};
use technical_analysis::atr;
use tokio::sync::{broadcast, mpsc};

/// Per-symbol ingestion task: owns that symbol's rolling series, seeds
/// it from historical klines, then folds in completed candles from the
/// live stream in arrival order and scores after every bar.
pub struct SeriesIngestor {
    symbol: String,
    series: PriceSeries,
    min_candles: usize,
    tier: RiskTier,
    strategy: ScoringStrategy,
    candles: broadcast::Receiver<CandleUpdate>,
    signals: mpsc::Sender<Signal>,
}

impl SeriesIngestor {
    pub fn new(
        symbol: String,
        capacity: usize,
        min_candles: usize,
        tier: RiskTier,
        strategy: ScoringStrategy,
        candles: broadcast::Receiver<CandleUpdate>,
        signals: mpsc::Sender<Signal>,
    ) -> Self {
        Self {
            symbol,
            series: PriceSeries::new(capacity),
            min_candles,
            tier,
            strategy,
            candles,
            signals,
        }
    }

    /// Pre-populate the series from a historical fetch. An empty slice
    /// is fine: scoring simply stays quiet until live bars accumulate.
    pub fn seed(&mut self, history: &[Candle]) {
        for candle in history {
            self.series.push(candle);
        }
        tracing::info!("{}: seeded {} candles", self.symbol, self.series.len());
    }

    pub async fn run(mut self) {
        loop {
            match self.candles.recv().await {
                Ok(update) if update.symbol.eq_ignore_ascii_case(&self.symbol) => {
                    self.handle_candle(&update.candle).await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("{}: candle stream lagged {} bars", self.symbol, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("{}: candle stream closed, series is stale", self.symbol);
                    return;
                }
            }
        }
    }

    async fn handle_candle(&mut self, candle: &Candle) {
        self.series.push(candle);
        self.scan().await;
    }

    async fn scan(&mut self) {
        let required = self.min_candles.max(self.strategy.min_closes());
        if self.series.len() < required {
            return;
        }

        let view = self.series.snapshot();
        let volatility = atr(view.highs, view.lows, view.closes, 14);
        tracing::debug!(
            "{}: close {:.4}, ATR(14) {:.4}",
            self.symbol,
            view.closes[view.closes.len() - 1],
            volatility
        );

        if let Some(signal) = analyze_market(&self.symbol, view.closes, &self.tier, self.strategy)
        {
            tracing::info!(
                "{}: {} signal, strength {:.0}, tier {} [{}]",
                self.symbol,
                signal.direction.label(),
                signal.strength,
                signal.risk_tier,
                signal.reasons.join(", ")
            );
            if self.signals.send(signal).await.is_err() {
                tracing::warn!("{}: signal sink closed, dropping signal", self.symbol);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::Direction;

    fn candle(i: usize, close: f64) -> Candle {
        Candle {
            open_time: i as i64 * 60_000,
            open: close,
            high: close + 0.25,
            low: close - 0.25,
            close,
            volume: 100.0,
        }
    }

    fn permissive_tier() -> RiskTier {
        RiskTier {
            id: 9,
            name: "Test",
            stop_loss_pct: 1.0,
            take_profit_pct: 5.0,
            min_strength: 40.0,
            min_confirmations: 2,
        }
    }

    #[tokio::test]
    async fn quiet_until_enough_history() {
        let (_candle_tx, candle_rx) = broadcast::channel(8);
        let (signal_tx, mut signal_rx) = mpsc::channel(8);
        let mut ingestor = SeriesIngestor::new(
            "ETHUSDT".to_string(),
            200,
            50,
            permissive_tier(),
            ScoringStrategy::WeightedConfluence,
            candle_rx,
            signal_tx,
        );

        // 49 declining closes: one short of the scoring minimum.
        for i in 0..49 {
            ingestor.handle_candle(&candle(i, 120.0 - 0.5 * i as f64)).await;
        }
        assert!(signal_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn emits_a_signal_once_the_setup_completes() {
        let (_candle_tx, candle_rx) = broadcast::channel(8);
        let (signal_tx, mut signal_rx) = mpsc::channel(8);
        let mut ingestor = SeriesIngestor::new(
            "ETHUSDT".to_string(),
            200,
            50,
            permissive_tier(),
            ScoringStrategy::WeightedConfluence,
            candle_rx,
            signal_tx,
        );

        // Full steady decline: RSI pinned low, price hugging the lower
        // band. The permissive tier accepts the resulting buy.
        for i in 0..50 {
            ingestor.handle_candle(&candle(i, 120.0 - 0.5 * i as f64)).await;
        }

        let signal = signal_rx.try_recv().expect("expected a signal");
        assert_eq!(signal.symbol, "ETHUSDT");
        assert_eq!(signal.direction, Direction::Buy);
        assert!(signal.reasons.len() >= 2);
    }

    #[tokio::test]
    async fn seeding_counts_toward_the_minimum() {
        let (_candle_tx, candle_rx) = broadcast::channel(8);
        let (signal_tx, mut signal_rx) = mpsc::channel(8);
        let mut ingestor = SeriesIngestor::new(
            "ETHUSDT".to_string(),
            200,
            50,
            permissive_tier(),
            ScoringStrategy::WeightedConfluence,
            candle_rx,
            signal_tx,
        );

        let history: Vec<Candle> = (0..49)
            .map(|i| candle(i, 120.0 - 0.5 * i as f64))
            .collect();
        ingestor.seed(&history);
        assert!(signal_rx.try_recv().is_err());

        // One live bar completes the 50-candle look-back.
        ingestor.handle_candle(&candle(49, 95.5)).await;
        assert!(signal_rx.try_recv().is_ok());
    }
}
