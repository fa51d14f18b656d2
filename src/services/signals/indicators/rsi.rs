//! Relative Strength Index (RSI) indicator.

use crate::types::IndicatorSeries;

/// RSI with Wilder smoothing.
///
/// Values range from 0-100:
/// - Below 30: Oversold (potential buy signal)
/// - Above 70: Overbought (potential sell signal)
///
/// The first `period` positions are `None`. The first defined value uses the
/// simple average of the first `period` deltas; later values are smoothed as
/// `avg = (avg * (period - 1) + x) / period`. Needs `period + 1` prices.
pub fn rsi(prices: &[f64], period: usize) -> IndicatorSeries {
    let mut series = vec![None; prices.len()];
    if period == 0 || prices.len() < period + 1 {
        return series;
    }

    let mut gains = Vec::with_capacity(prices.len() - 1);
    let mut losses = Vec::with_capacity(prices.len() - 1);

    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(-change);
        }
    }

    let mut avg_gain: f64 = gains.iter().take(period).sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses.iter().take(period).sum::<f64>() / period as f64;
    series[period] = Some(rsi_value(avg_gain, avg_loss));

    // Delta j sits between prices j and j + 1.
    for j in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[j]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[j]) / period as f64;
        series[j + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    series
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uptrend(count: usize) -> Vec<f64> {
        (0..count).map(|i| 100.0 + i as f64 * 1.5).collect()
    }

    fn downtrend(count: usize) -> Vec<f64> {
        (0..count).map(|i| 200.0 - i as f64 * 1.5).collect()
    }

    #[test]
    fn test_rsi_leading_positions_absent() {
        let result = rsi(&uptrend(20), 14);
        assert_eq!(result.len(), 20);
        assert!(result[..14].iter().all(Option::is_none));
        assert!(result[14..].iter().all(Option::is_some));
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let result = rsi(&uptrend(30), 14);
        for value in result.iter().flatten() {
            assert_eq!(*value, 100.0);
        }
    }

    #[test]
    fn test_rsi_all_losses_is_zero() {
        let result = rsi(&downtrend(30), 14);
        assert_eq!(result.last().copied().flatten(), Some(0.0));
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let result = rsi(&uptrend(14), 14);
        assert!(result.iter().all(Option::is_none));
        assert!(rsi(&[], 14).is_empty());
    }

    #[test]
    fn test_rsi_wilder_smoothing() {
        // deltas: +1, -1, +2 with period 2
        // first: gain 0.5, loss 0.5 -> 50
        // next: gain (0.5 + 2) / 2 = 1.25, loss (0.5 + 0) / 2 = 0.25 -> rs 5 -> 83.33
        let result = rsi(&[10.0, 11.0, 10.0, 12.0], 2);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_eq!(result[2], Some(50.0));
        let last = result[3].unwrap();
        assert!((last - (100.0 - 100.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_value_range() {
        let prices: Vec<f64> = (0..60)
            .map(|i| 100.0 + ((i as f64) * 0.7).sin() * 5.0)
            .collect();
        for value in rsi(&prices, 14).iter().flatten() {
            assert!((0.0..=100.0).contains(value));
        }
    }
}
