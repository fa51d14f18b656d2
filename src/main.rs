use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil::config::{Config, SymbolSelection};
use vigil::services::{
    AnalysisCache, GatingPolicy, PollingScheduler, RecommendationStore, SchedulerSettings,
    SymbolDirectory,
};
use vigil::sources::{BinanceClient, MarketDataSource};
use vigil::AppState;

/// How long discovered symbol lists stay fresh.
const SYMBOL_LIST_TTL: Duration = Duration::from_secs(3600);

/// Resolve the monitored instruments, discovering them from the exchange
/// when configured with `SYMBOLS=auto`.
async fn resolve_instruments(config: &Config, source: &dyn MarketDataSource) -> Vec<String> {
    match &config.symbols {
        SymbolSelection::Fixed(symbols) => symbols.clone(),
        SymbolSelection::Discover => {
            match source.list_symbols(&config.market_data.quote_asset).await {
                Ok(mut symbols) if !symbols.is_empty() => {
                    symbols.truncate(config.market_data.max_discovered_symbols);
                    info!("Discovered {} symbols from {}", symbols.len(), source.name());
                    symbols
                }
                Ok(_) => {
                    warn!("Symbol discovery returned nothing, using defaults");
                    default_instruments()
                }
                Err(e) => {
                    warn!("Symbol discovery failed, using defaults: {}", e);
                    default_instruments()
                }
            }
        }
    }
}

fn default_instruments() -> Vec<String> {
    match SymbolSelection::default() {
        SymbolSelection::Fixed(symbols) => symbols,
        SymbolSelection::Discover => Vec::new(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting Vigil server on {}:{}", config.host, config.port);

    // Open the recommendation store
    let store = Arc::new(RecommendationStore::new(
        &config.database_path,
        GatingPolicy::from(&config.gating),
    )?);
    info!("Recommendation store opened at {}", config.database_path);

    // Market data source
    let source: Arc<dyn MarketDataSource> = Arc::new(BinanceClient::new(&config.market_data));

    let instruments = resolve_instruments(&config, source.as_ref()).await;
    info!("Monitoring {}", instruments.join(", "));

    let cache = AnalysisCache::new();
    let symbols = SymbolDirectory::new(source.clone(), SYMBOL_LIST_TTL);
    let scheduler = PollingScheduler::new(
        source,
        cache.clone(),
        store.clone(),
        instruments,
        SchedulerSettings::from(config.as_ref()),
    );

    let state = AppState {
        config: config.clone(),
        cache,
        store,
        symbols,
        scheduler: scheduler.clone(),
    };

    // Start the polling loop
    let poller = scheduler.start();

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Vigil server listening on {}", addr);

    let shutdown_scheduler = scheduler.clone();
    axum::serve(listener, vigil::app(state))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
            shutdown_scheduler.stop();
        })
        .await?;

    if let Some(handle) = poller {
        handle.await?;
    }

    Ok(())
}
