//! Market data sources.

pub mod binance;

pub use binance::BinanceClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::PricePoint;

/// Candle and symbol retrieval from an exchange.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &str;

    /// Closing prices for the most recent `limit` candles, oldest first.
    async fn fetch_prices(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>>;

    /// Tradable symbols quoted in `quote_asset`.
    async fn list_symbols(&self, quote_asset: &str) -> Result<Vec<String>>;
}
