use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::Result;
use crate::sources::MarketDataSource;

struct CachedSymbols {
    symbols: Vec<String>,
    expires_at: Instant,
}

/// Tradable symbol lists from the market data source, memoized per quote
/// asset with a TTL.
pub struct SymbolDirectory {
    source: Arc<dyn MarketDataSource>,
    entries: DashMap<String, CachedSymbols>,
    ttl: Duration,
}

impl SymbolDirectory {
    pub fn new(source: Arc<dyn MarketDataSource>, ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            source,
            entries: DashMap::new(),
            ttl,
        })
    }

    /// Symbols quoted in `quote_asset`, fetched on miss or expiry.
    pub async fn symbols(&self, quote_asset: &str) -> Result<Vec<String>> {
        let key = quote_asset.trim().to_uppercase();

        if let Some(entry) = self.entries.get(&key) {
            if entry.expires_at > Instant::now() {
                return Ok(entry.symbols.clone());
            }
        }

        debug!("Refreshing {} symbol list from {}", key, self.source.name());
        let symbols = self.source.list_symbols(&key).await?;
        self.entries.insert(
            key,
            CachedSymbols {
                symbols: symbols.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(symbols)
    }

    /// Drop all memoized lists.
    pub fn invalidate(&self) {
        self.entries.clear();
    }
}
