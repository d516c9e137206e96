#[cfg(test)]
mod tests {
    use super::super::indicators::*;

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    #[test]
    fn test_rsi_in_bounds() {
        let prices = sample_prices();
        let value = rsi(&prices, 14);
        assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn test_rsi_known_value() {
        // Alternating +1/-1 deltas with period 2:
        // seed avg gain = avg loss = 0.5, then two smoothing steps
        // leave rs = 0.375/0.625 = 0.6 -> RSI 37.5.
        let closes = vec![10.0, 11.0, 10.0, 11.0, 10.0];
        let value = rsi(&closes, 2);
        assert!((value - 37.5).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let closes: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        assert_eq!(rsi(&closes, 14), 100.0);
    }

    #[test]
    fn test_rsi_insufficient_data_is_neutral() {
        let closes = vec![1.0, 2.0, 3.0];
        assert_eq!(rsi(&closes, 14), 50.0);
    }

    #[test]
    fn test_bollinger_bands_known_values() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let bb = bollinger_bands(&closes, 5, 2.0);

        // mean 3, population variance 2
        let sigma = 2.0_f64.sqrt();
        assert!((bb.middle - 3.0).abs() < 1e-9);
        assert!((bb.upper - (3.0 + 2.0 * sigma)).abs() < 1e-9);
        assert!((bb.lower - (3.0 - 2.0 * sigma)).abs() < 1e-9);
    }

    #[test]
    fn test_bollinger_bands_ordering() {
        let prices = sample_prices();
        let bb = bollinger_bands(&prices, 10, 2.0);
        assert!(bb.lower <= bb.middle);
        assert!(bb.middle <= bb.upper);
    }

    #[test]
    fn test_bollinger_bands_flat_window_collapses() {
        let closes = vec![100.0; 20];
        let bb = bollinger_bands(&closes, 20, 2.0);
        assert_eq!(bb.upper, 100.0);
        assert_eq!(bb.middle, 100.0);
        assert_eq!(bb.lower, 100.0);
    }

    #[test]
    fn test_bollinger_bands_insufficient_data() {
        let closes = vec![1.0, 2.0];
        assert_eq!(bollinger_bands(&closes, 20, 2.0), BollingerBands::default());
    }

    #[test]
    fn test_ema_recurrence() {
        // period 3 -> k = 0.5: [2, 3, 5.5]
        let series = vec![2.0, 4.0, 8.0];
        let out = ema(&series, 3);
        assert_eq!(out, vec![2.0, 3.0, 5.5]);
    }

    #[test]
    fn test_ema_same_length_and_seed() {
        let prices = sample_prices();
        let out = ema(&prices, 9);
        assert_eq!(out.len(), prices.len());
        assert_eq!(out[0], prices[0]);
    }

    #[test]
    fn test_ema_tracks_uptrend() {
        let series: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let out = ema(&series, 3);
        for i in 1..out.len() {
            assert!(out[i] > out[i - 1]);
        }
    }

    #[test]
    fn test_ema_empty_input() {
        let out = ema(&[], 5);
        assert!(out.is_empty());
    }

    #[test]
    fn test_macd_neutral_below_minimum() {
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        // 30 < slow + signal = 35
        assert_eq!(macd(&closes, 12, 26, 9), Macd::default());
    }

    #[test]
    fn test_macd_histogram_relation() {
        let closes: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        let m = macd(&closes, 12, 26, 9);
        assert!((m.histogram - (m.macd - m.signal)).abs() < 1e-9);
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let closes: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        let m = macd(&closes, 12, 26, 9);
        assert!(m.macd > 0.0);
        assert!(m.histogram > 0.0);
        assert!(m.prev_histogram > 0.0);
    }

    #[test]
    fn test_atr_known_value() {
        let highs = vec![10.0, 12.0];
        let lows = vec![8.0, 9.0];
        let closes = vec![9.0, 11.0];
        // Last bar: max(12-9, |12-9|, |9-9|) = 3
        assert_eq!(atr(&highs, &lows, &closes, 1), 3.0);
    }

    #[test]
    fn test_atr_insufficient_data() {
        let highs = vec![10.0, 12.0];
        let lows = vec![8.0, 9.0];
        let closes = vec![9.0, 11.0];
        assert_eq!(atr(&highs, &lows, &closes, 14), 0.0);
    }

    #[test]
    fn test_atr_grows_with_volatility() {
        let n = 20;
        let closes: Vec<f64> = vec![100.0; n];
        let calm_highs: Vec<f64> = vec![101.0; n];
        let calm_lows: Vec<f64> = vec![99.0; n];
        let wild_highs: Vec<f64> = vec![110.0; n];
        let wild_lows: Vec<f64> = vec![90.0; n];

        let calm = atr(&calm_highs, &calm_lows, &closes, 14);
        let wild = atr(&wild_highs, &wild_lows, &closes, 14);
        assert!(wild > calm);
        assert!(calm > 0.0);
    }
}
