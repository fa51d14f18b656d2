use serde::{Deserialize, Serialize};

/// One candle's closing price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Candle open time, epoch milliseconds.
    pub time: i64,
    /// Closing price.
    pub value: f64,
}

impl PricePoint {
    pub fn new(time: i64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Extract the closing values of a chronological price sequence.
pub fn closes(prices: &[PricePoint]) -> Vec<f64> {
    prices.iter().map(|p| p.value).collect()
}
