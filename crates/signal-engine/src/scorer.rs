use chrono::Utc;
use market_core::{Direction, Signal};
use technical_analysis::{bollinger_bands, ema, macd, rsi};

use crate::risk::RiskTier;

/// Minimum closes before the weighted scorer attempts anything.
pub const MIN_CLOSES_WEIGHTED: usize = 50;
/// Minimum closes for the band-touch filter.
pub const MIN_CLOSES_BAND_TOUCH: usize = 20;

/// Which scoring algorithm the scanner runs. These are alternatives
/// chosen up front, never combined within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoringStrategy {
    /// Weighted multi-indicator confluence, gated by the risk tier.
    #[default]
    WeightedConfluence,
    /// Binary RSI + Bollinger band-touch filter with fixed 1%/5% stops.
    BandTouch,
}

impl ScoringStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weighted" | "weighted_confluence" | "confluence" => {
                Some(ScoringStrategy::WeightedConfluence)
            }
            "band_touch" | "bandtouch" => Some(ScoringStrategy::BandTouch),
            _ => None,
        }
    }

    pub fn min_closes(&self) -> usize {
        match self {
            ScoringStrategy::WeightedConfluence => MIN_CLOSES_WEIGHTED,
            ScoringStrategy::BandTouch => MIN_CLOSES_BAND_TOUCH,
        }
    }
}

/// Score one symbol's close series. `None` means either not enough
/// history or no setup that clears the tier's filters; neither is an
/// error.
pub fn analyze_market(
    symbol: &str,
    closes: &[f64],
    tier: &RiskTier,
    strategy: ScoringStrategy,
) -> Option<Signal> {
    match strategy {
        ScoringStrategy::WeightedConfluence => weighted_confluence(symbol, closes, tier),
        ScoringStrategy::BandTouch => band_touch(symbol, closes, tier),
    }
}

/// Weighted multi-confirmation score. Each indicator adds fixed points
/// to the buy or sell side; the larger side wins and its total (capped
/// at 100) becomes the signal strength. Accepted only when
/// the strength clears the tier minimum and at least
/// `min_confirmations` indicator statements fired.
fn weighted_confluence(symbol: &str, closes: &[f64], tier: &RiskTier) -> Option<Signal> {
    if closes.len() < MIN_CLOSES_WEIGHTED {
        return None;
    }

    let rsi_value = rsi(closes, 14);
    let bb = bollinger_bands(closes, 20, 2.0);
    let macd_state = macd(closes, 12, 26, 9);
    let ema_short = ema(closes, 9);
    let ema_long = ema(closes, 21);

    let n = closes.len();
    let last = closes[n - 1];
    let prev = closes[n - 2];

    let mut buy = 0.0_f64;
    let mut sell = 0.0_f64;
    let mut reasons: Vec<String> = Vec::new();

    // RSI, 30 points at the extremes, 15 in the approaching band.
    if rsi_value < 30.0 {
        buy += 30.0;
        reasons.push(format!("RSI Oversold ({rsi_value:.1})"));
    } else if rsi_value > 70.0 {
        sell += 30.0;
        reasons.push(format!("RSI Overbought ({rsi_value:.1})"));
    } else if rsi_value < 40.0 {
        buy += 15.0;
        reasons.push(format!("RSI Low ({rsi_value:.1})"));
    } else if rsi_value > 60.0 {
        sell += 15.0;
        reasons.push(format!("RSI High ({rsi_value:.1})"));
    }

    // Bollinger proximity, 25 points within 0.5% of a band, 12 within 1.5%.
    let lower_dist = (last - bb.lower) / bb.lower * 100.0;
    let upper_dist = (bb.upper - last) / bb.upper * 100.0;
    if lower_dist < 0.5 {
        buy += 25.0;
        reasons.push(format!("Price at Lower BB (${:.2})", bb.lower));
    } else if upper_dist < 0.5 {
        sell += 25.0;
        reasons.push(format!("Price at Upper BB (${:.2})", bb.upper));
    } else if lower_dist < 1.5 {
        buy += 12.0;
        reasons.push("Price near Lower BB".to_string());
    } else if upper_dist < 1.5 {
        sell += 12.0;
        reasons.push("Price near Upper BB".to_string());
    }

    // MACD histogram, 20 points when growing in its own direction.
    if macd_state.histogram > 0.0 && macd_state.histogram > macd_state.prev_histogram {
        buy += 20.0;
        reasons.push("MACD Bullish Momentum".to_string());
    } else if macd_state.histogram < 0.0 && macd_state.histogram < macd_state.prev_histogram {
        sell += 20.0;
        reasons.push("MACD Bearish Momentum".to_string());
    } else if macd_state.histogram > 0.0 {
        buy += 10.0;
    } else if macd_state.histogram < 0.0 {
        sell += 10.0;
    }

    // EMA 9/21, 15 points for a fresh cross, 7 for trend alignment.
    let e9 = ema_short[n - 1];
    let e21 = ema_long[n - 1];
    let p9 = ema_short[n - 2];
    let p21 = ema_long[n - 2];
    if e9 > e21 && p9 <= p21 {
        buy += 15.0;
        reasons.push("Golden Cross (EMA 9/21)".to_string());
    } else if e9 < e21 && p9 >= p21 {
        sell += 15.0;
        reasons.push("Death Cross (EMA 9/21)".to_string());
    } else if e9 > e21 {
        buy += 7.0;
    } else if e9 < e21 {
        sell += 7.0;
    }

    // Last-bar momentum, 10 points past 0.5%, 5 past 0.2%.
    let momentum = (last - prev) / prev * 100.0;
    if momentum > 0.5 {
        buy += 10.0;
        reasons.push("Strong Upward Momentum".to_string());
    } else if momentum < -0.5 {
        sell += 10.0;
        reasons.push("Strong Downward Momentum".to_string());
    } else if momentum > 0.2 {
        buy += 5.0;
    } else if momentum < -0.2 {
        sell += 5.0;
    }

    let direction = if buy > sell {
        Direction::Buy
    } else {
        Direction::Sell
    };
    let strength = f64::min(100.0, buy.max(sell));

    tracing::debug!(
        "{}: buy {:.0} / sell {:.0}, strength {:.0} ({} statements)",
        symbol,
        buy,
        sell,
        strength,
        reasons.len()
    );

    if strength < tier.min_strength || reasons.len() < tier.min_confirmations {
        return None;
    }

    let (stop_loss_price, take_profit_price) = bracket_prices(
        direction,
        last,
        tier.stop_loss_pct / 100.0,
        tier.take_profit_pct / 100.0,
    );

    Some(Signal {
        symbol: symbol.to_string(),
        direction,
        strength,
        entry_price: last,
        stop_loss_price,
        take_profit_price,
        reasons,
        risk_tier: tier.name.to_string(),
        created_at: Utc::now(),
    })
}

/// Band-touch stop/take distances, independent of the risk tier.
const BAND_TOUCH_STOP_LOSS: f64 = 0.01;
const BAND_TOUCH_TAKE_PROFIT: f64 = 0.05;
const BAND_TOUCH_STRENGTH: f64 = 85.0;

/// Binary filter: BUY when the RSI is depressed and price touches the
/// lower band, SELL on the mirrored condition, otherwise nothing.
fn band_touch(symbol: &str, closes: &[f64], tier: &RiskTier) -> Option<Signal> {
    if closes.len() < MIN_CLOSES_BAND_TOUCH {
        return None;
    }

    let rsi_value = rsi(closes, 14);
    let bb = bollinger_bands(closes, 20, 2.0);
    let last = closes[closes.len() - 1];

    let oversold = rsi_value < 40.0 && last <= bb.lower * 1.001;
    let overbought = rsi_value > 60.0 && last >= bb.upper * 0.999;

    let direction = if oversold {
        Direction::Buy
    } else if overbought {
        Direction::Sell
    } else {
        return None;
    };

    let reasons = match direction {
        Direction::Buy => vec![
            format!("Price hit Lower Bollinger Band (${:.2})", bb.lower),
            format!("RSI Oversold ({rsi_value:.0})"),
        ],
        Direction::Sell => vec![
            format!("Price hit Upper Bollinger Band (${:.2})", bb.upper),
            format!("RSI Overbought ({rsi_value:.0})"),
        ],
    };

    let (stop_loss_price, take_profit_price) =
        bracket_prices(direction, last, BAND_TOUCH_STOP_LOSS, BAND_TOUCH_TAKE_PROFIT);

    Some(Signal {
        symbol: symbol.to_string(),
        direction,
        strength: BAND_TOUCH_STRENGTH,
        entry_price: last,
        stop_loss_price,
        take_profit_price,
        reasons,
        risk_tier: tier.name.to_string(),
        created_at: Utc::now(),
    })
}

/// Stop/take price levels around the entry for a given direction.
/// Fractions are of price (0.01 = 1%).
fn bracket_prices(
    direction: Direction,
    entry: f64,
    stop_frac: f64,
    take_frac: f64,
) -> (f64, f64) {
    match direction {
        Direction::Buy => (entry * (1.0 - stop_frac), entry * (1.0 + take_frac)),
        Direction::Sell => (entry * (1.0 + stop_frac), entry * (1.0 - take_frac)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{AGGRESSIVE, CONSERVATIVE};

    fn steady_decline() -> Vec<f64> {
        // 120.0 down to 95.5 in 0.5 steps: RSI pinned at 0, price riding
        // just above the lower band.
        (0..50).map(|i| 120.0 - 0.5 * i as f64).collect()
    }

    #[test]
    fn too_little_history_yields_nothing() {
        let closes = vec![100.0; 49];
        let signal = analyze_market(
            "BTCUSDT",
            &closes,
            &CONSERVATIVE,
            ScoringStrategy::WeightedConfluence,
        );
        assert!(signal.is_none());
    }

    #[test]
    fn lone_spike_is_rejected_by_conservative_tier() {
        // 49 flat closes then a 20% jump. Momentum, MACD and the EMA
        // cross all vote buy, but RSI reads 100 and the close sits above
        // the upper band, so the sell side wins at strength 55 and the
        // 75-point floor rejects it.
        let mut closes = vec![100.0; 49];
        closes.push(120.0);
        let signal = analyze_market(
            "BTCUSDT",
            &closes,
            &CONSERVATIVE,
            ScoringStrategy::WeightedConfluence,
        );
        assert!(signal.is_none());
    }

    #[test]
    fn decline_scores_a_buy_for_a_permissive_tier() {
        let tier = RiskTier {
            id: 9,
            name: "Test",
            stop_loss_pct: 1.0,
            take_profit_pct: 5.0,
            min_strength: 40.0,
            min_confirmations: 2,
        };
        let closes = steady_decline();
        let signal =
            analyze_market("ETHUSDT", &closes, &tier, ScoringStrategy::WeightedConfluence)
                .expect("expected a buy setup");

        assert_eq!(signal.direction, Direction::Buy);
        assert!(signal.strength >= 40.0);
        assert!(signal.reasons.len() >= 2);
        assert_eq!(signal.entry_price, 95.5);
        assert!((signal.stop_loss_price - 95.5 * 0.99).abs() < 1e-9);
        assert!((signal.take_profit_price - 95.5 * 1.05).abs() < 1e-9);
        assert_eq!(signal.risk_tier, "Test");
    }

    #[test]
    fn same_decline_fails_stricter_tiers() {
        let closes = steady_decline();
        for tier in [&CONSERVATIVE, &AGGRESSIVE] {
            let signal =
                analyze_market("ETHUSDT", &closes, tier, ScoringStrategy::WeightedConfluence);
            assert!(signal.is_none(), "{} should reject", tier.name);
        }
    }

    #[test]
    fn band_touch_buy_on_lower_band_break() {
        let mut closes = vec![100.0; 19];
        closes.push(90.0);
        let signal =
            analyze_market("SOLUSDT", &closes, &CONSERVATIVE, ScoringStrategy::BandTouch)
                .expect("expected a band-touch buy");

        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.strength, BAND_TOUCH_STRENGTH);
        assert_eq!(signal.reasons.len(), 2);
        assert!((signal.stop_loss_price - 90.0 * 0.99).abs() < 1e-9);
        assert!((signal.take_profit_price - 90.0 * 1.05).abs() < 1e-9);
    }

    #[test]
    fn band_touch_holds_inside_the_bands() {
        // Alternating closes sit mid-band; neither touch condition fires.
        let closes: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let signal =
            analyze_market("XRPUSDT", &closes, &CONSERVATIVE, ScoringStrategy::BandTouch);
        assert!(signal.is_none());
    }

    #[test]
    fn strategy_parse_round_trip() {
        assert_eq!(
            ScoringStrategy::parse("weighted"),
            Some(ScoringStrategy::WeightedConfluence)
        );
        assert_eq!(
            ScoringStrategy::parse("BAND_TOUCH"),
            Some(ScoringStrategy::BandTouch)
        );
        assert!(ScoringStrategy::parse("ensemble").is_none());
    }
}
