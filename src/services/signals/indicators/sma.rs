//! Simple Moving Average (SMA) indicator.

use crate::types::IndicatorSeries;

/// Trailing arithmetic mean over `period` closes.
///
/// Positions with fewer than `period` values behind them are `None`.
/// A zero period yields an all-`None` series.
pub fn sma(prices: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 {
        return vec![None; prices.len()];
    }

    (0..prices.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &prices[i + 1 - period..=i];
            Some(window.iter().sum::<f64>() / period as f64)
        })
        .collect()
}
