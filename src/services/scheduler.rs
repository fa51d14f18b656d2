//! Polling Scheduler
//!
//! Drives the analysis cycle: fetch candles, compute indicators, refresh the
//! analysis cache and offer the signal to the recommendation store. One
//! instrument failing never stops the rest of the cycle or the loop.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{Config, IndicatorConfig};
use crate::error::{AppError, Result};
use crate::services::recommendation::RecommendationStore;
use crate::services::signals::analyze;
use crate::services::AnalysisCache;
use crate::sources::MarketDataSource;
use crate::types::{AnalysisSnapshot, PricePoint, SignalSubmission};

/// Whether a cycle is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Tallies for one pass over the monitored instruments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub processed: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub kline_limit: usize,
    pub fetch_timeout: Duration,
    pub indicators: IndicatorConfig,
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            kline_limit: config.market_data.kline_limit,
            fetch_timeout: config.market_data.fetch_timeout,
            indicators: config.indicators.clone(),
        }
    }
}

/// Periodic analysis job over a fixed instrument list.
pub struct PollingScheduler {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<AnalysisCache>,
    store: Arc<RecommendationStore>,
    instruments: Vec<String>,
    settings: SchedulerSettings,
    /// Set while the background loop is alive.
    active: AtomicBool,
    /// Set while a cycle is executing.
    cycle_running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl PollingScheduler {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        cache: Arc<AnalysisCache>,
        store: Arc<RecommendationStore>,
        instruments: Vec<String>,
        settings: SchedulerSettings,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        let instruments = instruments
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        Arc::new(Self {
            source,
            cache,
            store,
            instruments,
            settings,
            active: AtomicBool::new(false),
            cycle_running: AtomicBool::new(false),
            shutdown_tx,
        })
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn state(&self) -> SchedulerState {
        if self.cycle_running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawn the polling loop. Returns `None` if it is already running.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.active.swap(true, Ordering::SeqCst) {
            warn!("Polling scheduler already started");
            return None;
        }

        // Subscribe before spawning so an early stop() is not missed.
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let scheduler = Arc::clone(self);

        info!(
            "Polling scheduler started: {} instruments every {:?} via {}",
            scheduler.instruments.len(),
            scheduler.settings.poll_interval,
            scheduler.source.name()
        );

        Some(tokio::spawn(async move {
            let mut ticker = interval(scheduler.settings.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.run_cycle().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Polling scheduler received shutdown signal");
                        break;
                    }
                }
            }

            scheduler.active.store(false, Ordering::SeqCst);
        }))
    }

    /// Signal the loop to stop after the current cycle.
    pub fn stop(&self) {
        if !self.is_active() {
            return;
        }
        // No receivers means the loop already exited.
        let _ = self.shutdown_tx.send(());
        info!("Polling scheduler stopping");
    }

    /// Run one full pass over every monitored instrument.
    pub async fn run_cycle(&self) -> CycleReport {
        self.cycle_running.store(true, Ordering::SeqCst);
        let mut report = CycleReport::default();

        for symbol in &self.instruments {
            report.processed += 1;
            match self.process_instrument(symbol).await {
                Ok(true) => report.persisted += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    match e {
                        AppError::Storage(_) | AppError::Internal(_) => {
                            error!("Cycle failed for {}: {}", symbol, e)
                        }
                        _ => warn!("Cycle failed for {}: {}", symbol, e),
                    }
                }
            }
        }

        self.cycle_running.store(false, Ordering::SeqCst);
        info!(
            "Analysis cycle complete: {} processed, {} persisted, {} skipped, {} failed",
            report.processed, report.persisted, report.skipped, report.failed
        );
        report
    }

    /// Analyze one instrument. Returns whether a new event was persisted.
    async fn process_instrument(&self, symbol: &str) -> Result<bool> {
        let now = Utc::now();

        let prices = match self.fetch(symbol).await {
            Ok(prices) => prices,
            Err(e) => {
                let mut degraded = AnalysisSnapshot::empty(symbol);
                degraded.computed_at = Some(now.timestamp_millis());
                degraded.error = Some(e.to_string());
                self.cache.put(degraded);
                return Err(e);
            }
        };

        let snapshot = analyze(
            symbol,
            prices,
            &self.settings.indicators,
            now.timestamp_millis(),
        );
        if let Some(reason) = &snapshot.error {
            debug!("Degraded analysis for {}: {}", symbol, reason);
        }

        let signal = snapshot.signal();
        let price = snapshot.last_price();
        self.cache.put(snapshot);

        let Some(price) = price else {
            return Err(AppError::DataUnavailable(format!("no price for {}", symbol)));
        };

        let outcome = self.store.submit(&SignalSubmission {
            instrument: symbol.to_string(),
            signal,
            price,
            timestamp: now,
        })?;

        debug!(
            "{}: overall {} (sma {}, rsi {}, bb {}) -> {:?}",
            symbol, signal.overall, signal.sma, signal.rsi, signal.bb, outcome.reason
        );
        Ok(outcome.persisted)
    }

    async fn fetch(&self, symbol: &str) -> Result<Vec<PricePoint>> {
        let fetched = tokio::time::timeout(
            self.settings.fetch_timeout,
            self.source.fetch_prices(symbol, self.settings.kline_limit),
        )
        .await;

        match fetched {
            Err(_) => Err(AppError::DataUnavailable(format!(
                "fetch for {} timed out after {:?}",
                symbol, self.settings.fetch_timeout
            ))),
            Ok(Err(e @ AppError::DataUnavailable(_))) => Err(e),
            Ok(Err(e)) => Err(AppError::DataUnavailable(e.to_string())),
            Ok(Ok(prices)) if prices.is_empty() => Err(AppError::DataUnavailable(format!(
                "empty price series for {}",
                symbol
            ))),
            Ok(Ok(prices)) => Ok(prices),
        }
    }
}
