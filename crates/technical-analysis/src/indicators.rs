//! Pure indicator functions over price slices. Same input sequence, same
//! output; inputs shorter than the look-back return the neutral default
//! (RSI 50, zeroed bands/MACD, ATR 0) rather than an error.

/// Wilder-smoothed Relative Strength Index over the whole series.
///
/// The first `period` deltas seed the average gain/loss as a simple mean;
/// every later bar folds in with factor `(period-1)/period`. Output is in
/// [0, 100]; a window with no losses reads exactly 100.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return 50.0;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let diff = closes[i] - closes[i - 1];
        if diff >= 0.0 {
            gains += diff;
        } else {
            losses += -diff;
        }
    }

    let p = period as f64;
    let mut avg_gain = gains / p;
    let mut avg_loss = losses / p;

    for i in period + 1..closes.len() {
        let diff = closes[i] - closes[i - 1];
        let (gain, loss) = if diff >= 0.0 { (diff, 0.0) } else { (0.0, -diff) };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Bollinger Bands over the trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Mean +/- `k` population standard deviations (divide by N, not N-1)
/// over the last `period` closes. `lower <= middle <= upper` for any
/// k >= 0; all three collapse to the mean when the window is flat.
pub fn bollinger_bands(closes: &[f64], period: usize, k: f64) -> BollingerBands {
    if period == 0 || closes.len() < period {
        return BollingerBands::default();
    }

    let window = &closes[closes.len() - period..];
    let n = period as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    BollingerBands {
        upper: mean + k * std_dev,
        middle: mean,
        lower: mean - k * std_dev,
    }
}

/// Exponential moving average, one output per input.
///
/// Seeded with the first element; smoothing factor `2 / (period + 1)`.
pub fn ema(series: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || series.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(series.len());
    out.push(series[0]);
    for i in 1..series.len() {
        let prev = out[i - 1];
        out.push(series[i] * k + prev * (1.0 - k));
    }
    out
}

/// Last-bar MACD state, with the prior bar's histogram kept for momentum
/// comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub prev_histogram: f64,
}

/// EMA(fast) - EMA(slow) pointwise, signalled by an EMA over the MACD
/// line. Needs at least `slow + signal` closes; below that the result is
/// the zero-filled neutral state.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    if fast == 0 || slow == 0 || signal == 0 || closes.len() < slow + signal {
        return Macd::default();
    }

    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);
    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&macd_line, signal);

    let n = macd_line.len();
    Macd {
        macd: macd_line[n - 1],
        signal: signal_line[n - 1],
        histogram: macd_line[n - 1] - signal_line[n - 1],
        prev_histogram: macd_line[n - 2] - signal_line[n - 2],
    }
}

/// Average True Range: mean of `max(h-l, |h-prev_c|, |l-prev_c|)` over
/// the trailing `period` bars. The three slices must be aligned; a
/// mismatch or short input reads 0.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> f64 {
    let len = closes.len();
    if period == 0 || len < period + 1 || highs.len() != len || lows.len() != len {
        return 0.0;
    }

    let mut sum = 0.0;
    for i in len - period..len {
        let hl = highs[i] - lows[i];
        let hc = (highs[i] - closes[i - 1]).abs();
        let lc = (lows[i] - closes[i - 1]).abs();
        sum += hl.max(hc).max(lc);
    }
    sum / period as f64
}
