use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::MarketDataConfig;
use crate::error::{AppError, Result};
use crate::types::PricePoint;

use super::MarketDataSource;

/// Binance exchange info response (trimmed to what we read).
#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeSymbol {
    symbol: String,
    status: String,
    quote_asset: String,
}

/// Binance REST client for klines and symbol discovery.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    interval: String,
}

impl BinanceClient {
    /// Create a new Binance client.
    pub fn new(config: &MarketDataConfig) -> Self {
        let client = Client::builder()
            .user_agent("Vigil/1.0")
            .timeout(config.fetch_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.binance_api_url.trim_end_matches('/').to_string(),
            interval: config.kline_interval.clone(),
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self.client.get(url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            warn!("Binance API returned {}: {}", status, snippet);
            return Err(AppError::ExternalApi(format!("Binance API error: {}", status)));
        }

        Ok(response.json().await?)
    }
}

/// Parse a `/klines` payload into closing prices.
///
/// Each kline is an array: `[openTime, open, high, low, close, volume, ...]`
/// with prices encoded as strings.
pub fn parse_klines(payload: &Value) -> Result<Vec<PricePoint>> {
    let rows = payload
        .as_array()
        .ok_or_else(|| AppError::ExternalApi("klines payload is not an array".to_string()))?;

    let mut prices = Vec::with_capacity(rows.len());
    for row in rows {
        let time = row.get(0).and_then(Value::as_i64);
        let close = row.get(4).and_then(|v| match v {
            Value::String(s) => s.parse::<f64>().ok(),
            other => other.as_f64(),
        });

        match (time, close) {
            (Some(time), Some(value)) if value.is_finite() => {
                prices.push(PricePoint::new(time, value))
            }
            _ => debug!("Skipping unparseable kline: {}", row),
        }
    }

    prices.sort_by_key(|p| p.time);
    Ok(prices)
}

/// Symbols currently trading against `quote_asset`, sorted.
fn tradable_symbols(info: ExchangeInfo, quote_asset: &str) -> Vec<String> {
    let mut symbols: Vec<String> = info
        .symbols
        .into_iter()
        .filter(|s| s.status == "TRADING" && s.quote_asset.eq_ignore_ascii_case(quote_asset))
        .map(|s| s.symbol)
        .collect();
    symbols.sort();
    symbols
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch_prices(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>> {
        let url = format!("{}/klines", self.base_url);
        let payload = self
            .get_json(
                &url,
                &[
                    ("symbol", symbol.to_uppercase()),
                    ("interval", self.interval.clone()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let prices = parse_klines(&payload)?;
        if prices.is_empty() {
            return Err(AppError::DataUnavailable(format!(
                "no klines returned for {}",
                symbol
            )));
        }

        debug!("Fetched {} klines for {}", prices.len(), symbol);
        Ok(prices)
    }

    async fn list_symbols(&self, quote_asset: &str) -> Result<Vec<String>> {
        let url = format!("{}/exchangeInfo", self.base_url);
        let payload = self.get_json(&url, &[]).await?;
        let info: ExchangeInfo = serde_json::from_value(payload)?;
        let symbols = tradable_symbols(info, quote_asset);

        debug!("Discovered {} {} symbols", symbols.len(), quote_asset);
        Ok(symbols)
    }
}
