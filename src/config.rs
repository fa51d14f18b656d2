use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SYMBOLS: &[&str] = &["BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT"];

/// Indicator lookback parameters.
#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    /// Short SMA period.
    pub sma_short_period: usize,
    /// Long SMA period.
    pub sma_long_period: usize,
    /// RSI period (Wilder smoothing).
    pub rsi_period: usize,
    /// Bollinger Bands window.
    pub bb_period: usize,
    /// Bollinger Bands standard deviation multiplier.
    pub bb_std_dev: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_short_period: 20,
            sma_long_period: 50,
            rsi_period: 14,
            bb_period: 20,
            bb_std_dev: 2.0,
        }
    }
}

impl IndicatorConfig {
    /// Number of price points needed before every indicator yields a stance.
    pub fn min_history(&self) -> usize {
        // SMA crossover needs two defined points, RSI needs period + 1 closes.
        (self.sma_long_period.max(self.sma_short_period) + 1)
            .max(self.rsi_period + 1)
            .max(self.bb_period)
    }
}

/// Persistence gating parameters.
#[derive(Debug, Clone)]
pub struct GatingConfig {
    /// Minimum time between persisted events for one instrument.
    pub save_interval: Duration,
    /// Relative price move that forces a persist regardless of elapsed time.
    pub price_change_threshold: f64,
    /// Whether a signal with unavailable indicators may enter the log.
    pub persist_degraded: bool,
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            save_interval: Duration::from_secs(3600),
            price_change_threshold: 0.03,
            persist_degraded: false,
        }
    }
}

/// Market data source settings.
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    /// Binance REST base URL.
    pub binance_api_url: String,
    /// Kline interval passed to the exchange (e.g. "1h").
    pub kline_interval: String,
    /// Number of candles fetched per instrument.
    pub kline_limit: usize,
    /// Per-request timeout.
    pub fetch_timeout: Duration,
    /// Quote asset used for symbol discovery.
    pub quote_asset: String,
    /// Cap on discovered symbols when `SYMBOLS=auto`.
    pub max_discovered_symbols: usize,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            binance_api_url: "https://api.binance.com/api/v3".to_string(),
            kline_interval: "1h".to_string(),
            kline_limit: 100,
            fetch_timeout: Duration::from_secs(10),
            quote_asset: "USDT".to_string(),
            max_discovered_symbols: 20,
        }
    }
}

/// Instruments to monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSelection {
    /// Fixed list of exchange symbols.
    Fixed(Vec<String>),
    /// Discover tradable symbols from the market data source at startup.
    Discover,
}

impl SymbolSelection {
    /// Parse a comma separated list, or `auto`.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("auto") {
            return Self::Discover;
        }

        let symbols: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        if symbols.is_empty() {
            Self::default()
        } else {
            Self::Fixed(symbols)
        }
    }
}

impl Default for SymbolSelection {
    fn default() -> Self {
        Self::Fixed(DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect())
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database path.
    pub database_path: String,
    /// Monitored instruments.
    pub symbols: SymbolSelection,
    /// Polling interval for the analysis cycle.
    pub poll_interval: Duration,
    /// Default look-back window for history queries (hours).
    pub history_hours: i64,
    /// Default page size for history queries.
    pub default_page_size: usize,
    pub indicators: IndicatorConfig,
    pub gating: GatingConfig,
    pub market_data: MarketDataConfig,
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let indicator_defaults = IndicatorConfig::default();
        let gating_defaults = GatingConfig::default();
        let market_defaults = MarketDataConfig::default();

        let symbols = env::var("SYMBOLS")
            .map(|raw| SymbolSelection::parse(&raw))
            .unwrap_or_default();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 5000),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "vigil.db".to_string()),
            symbols,
            poll_interval: Duration::from_secs(env_or("POLL_INTERVAL_SECS", 60)),
            history_hours: env_or("HISTORY_HOURS", 24),
            default_page_size: env_or("DEFAULT_PAGE_SIZE", 20),
            indicators: IndicatorConfig {
                sma_short_period: env_or("SMA_SHORT_PERIOD", indicator_defaults.sma_short_period),
                sma_long_period: env_or("SMA_LONG_PERIOD", indicator_defaults.sma_long_period),
                rsi_period: env_or("RSI_PERIOD", indicator_defaults.rsi_period),
                bb_period: env_or("BB_PERIOD", indicator_defaults.bb_period),
                bb_std_dev: env_or("BB_STD_DEV", indicator_defaults.bb_std_dev),
            },
            gating: GatingConfig {
                save_interval: Duration::from_secs(env_or(
                    "SAVE_INTERVAL_SECS",
                    gating_defaults.save_interval.as_secs(),
                )),
                price_change_threshold: env_or(
                    "PRICE_CHANGE_THRESHOLD",
                    gating_defaults.price_change_threshold,
                ),
                persist_degraded: env_flag(
                    "PERSIST_DEGRADED_SIGNALS",
                    gating_defaults.persist_degraded,
                ),
            },
            market_data: MarketDataConfig {
                binance_api_url: env::var("BINANCE_API_URL")
                    .unwrap_or(market_defaults.binance_api_url),
                kline_interval: env::var("KLINE_INTERVAL")
                    .unwrap_or(market_defaults.kline_interval),
                kline_limit: env_or("KLINE_LIMIT", market_defaults.kline_limit),
                fetch_timeout: Duration::from_secs(env_or(
                    "FETCH_TIMEOUT_SECS",
                    market_defaults.fetch_timeout.as_secs(),
                )),
                quote_asset: env::var("QUOTE_ASSET").unwrap_or(market_defaults.quote_asset),
                max_discovered_symbols: env_or(
                    "MAX_DISCOVERED_SYMBOLS",
                    market_defaults.max_discovered_symbols,
                ),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_selection_parses_list() {
        let selection = SymbolSelection::parse(" btcusdt, ETHUSDT ,,");
        assert_eq!(
            selection,
            SymbolSelection::Fixed(vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()])
        );
    }

    #[test]
    fn test_symbol_selection_auto() {
        assert_eq!(SymbolSelection::parse("AUTO"), SymbolSelection::Discover);
    }

    #[test]
    fn test_symbol_selection_empty_falls_back_to_defaults() {
        assert_eq!(SymbolSelection::parse(" , "), SymbolSelection::default());
    }

    #[test]
    fn test_min_history_covers_longest_lookback() {
        let config = IndicatorConfig::default();
        assert_eq!(config.min_history(), 51);

        let config = IndicatorConfig {
            sma_short_period: 3,
            sma_long_period: 5,
            rsi_period: 14,
            bb_period: 10,
            bb_std_dev: 2.0,
        };
        assert_eq!(config.min_history(), 15);
    }

    #[test]
    fn test_gating_defaults() {
        let gating = GatingConfig::default();
        assert_eq!(gating.save_interval, Duration::from_secs(3600));
        assert_eq!(gating.price_change_threshold, 0.03);
        assert!(!gating.persist_degraded);
    }
}
