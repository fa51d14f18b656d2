//! Bollinger Bands indicator.

use crate::types::BandSet;

/// Population standard deviation around `mean`.
fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance: f64 =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Trailing Bollinger Bands.
///
/// - Middle band: SMA(period)
/// - Upper band: middle + multiplier * stddev
/// - Lower band: middle - multiplier * stddev
///
/// The standard deviation divides by `period`. All three bands are `None`
/// for the first `period - 1` positions.
pub fn bollinger(prices: &[f64], period: usize, std_dev_multiplier: f64) -> BandSet {
    let len = prices.len();
    let mut bands = BandSet {
        middle: vec![None; len],
        upper: vec![None; len],
        lower: vec![None; len],
    };

    if period == 0 {
        return bands;
    }

    for i in (period - 1)..len {
        let window = &prices[i + 1 - period..=i];
        let middle = window.iter().sum::<f64>() / period as f64;
        let width = std_dev_multiplier * std_dev(window, middle);

        bands.middle[i] = Some(middle);
        bands.upper[i] = Some(middle + width);
        bands.lower[i] = Some(middle - width);
    }

    bands
}
