//! Polling Scheduler Tests
//!
//! Runs analysis cycles against a scripted market data source:
//! - A failing instrument does not abort the rest of the cycle
//! - The analysis cache reflects every processed instrument
//! - Short histories produce degraded snapshots that are never persisted
//! - Start/stop lifecycle of the background loop

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vigil::config::IndicatorConfig;
use vigil::error::{AppError, Result};
use vigil::services::{
    AnalysisCache, GatingPolicy, PollingScheduler, RecommendationStore, SchedulerSettings,
    SchedulerState,
};
use vigil::sources::MarketDataSource;
use vigil::{PricePoint, Stance};

/// Serves canned price series; unknown symbols fail.
struct ScriptedSource {
    series: HashMap<String, Vec<PricePoint>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(entries: &[(&str, Vec<PricePoint>)]) -> Arc<Self> {
        Arc::new(Self {
            series: entries
                .iter()
                .map(|(symbol, prices)| (symbol.to_string(), prices.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_prices(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.series.get(symbol) {
            Some(prices) => Ok(prices.iter().rev().take(limit).rev().cloned().collect()),
            None => Err(AppError::ExternalApi(format!("unknown symbol {}", symbol))),
        }
    }

    async fn list_symbols(&self, _quote_asset: &str) -> Result<Vec<String>> {
        Ok(self.series.keys().cloned().collect())
    }
}

fn trending(count: usize, start: f64) -> Vec<PricePoint> {
    (0..count)
        .map(|i| {
            let wiggle = if i % 2 == 0 { 0.5 } else { -0.3 };
            PricePoint::new(i as i64 * 3_600_000, start + i as f64 + wiggle)
        })
        .collect()
}

fn settings(poll_interval: Duration) -> SchedulerSettings {
    SchedulerSettings {
        poll_interval,
        kline_limit: 100,
        fetch_timeout: Duration::from_secs(2),
        indicators: IndicatorConfig {
            sma_short_period: 3,
            sma_long_period: 5,
            rsi_period: 5,
            bb_period: 5,
            bb_std_dev: 2.0,
        },
    }
}

fn store() -> Arc<RecommendationStore> {
    Arc::new(RecommendationStore::new_in_memory(GatingPolicy::default()).unwrap())
}

#[tokio::test]
async fn test_cycle_isolates_failures() {
    let source = ScriptedSource::new(&[
        ("BTCUSDT", trending(40, 100.0)),
        ("ETHUSDT", trending(40, 50.0)),
    ]);
    let cache = AnalysisCache::new();
    let store = store();
    let scheduler = PollingScheduler::new(
        source.clone(),
        cache.clone(),
        store.clone(),
        vec!["btcusdt".into(), "MISSINGUSDT".into(), "ethusdt".into()],
        settings(Duration::from_secs(60)),
    );

    let report = scheduler.run_cycle().await;
    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.persisted, 2);
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    let btc = cache.get("BTCUSDT").unwrap();
    assert!(btc.error.is_none());
    assert_eq!(btc.prices.len(), 40);
    assert_ne!(btc.overall, Stance::Unavailable);

    let missing = cache.get("MISSINGUSDT").unwrap();
    assert!(missing.error.is_some());
    assert_eq!(missing.sma, Stance::Unavailable);
    assert!(missing.prices.is_empty());

    assert!(store.latest_state("BTCUSDT").unwrap().is_some());
    assert!(store.latest_state("ETHUSDT").unwrap().is_some());
    assert!(store.latest_state("MISSINGUSDT").unwrap().is_none());
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[tokio::test]
async fn test_second_cycle_within_window_skips() {
    let source = ScriptedSource::new(&[("BTCUSDT", trending(40, 100.0))]);
    let store = store();
    let scheduler = PollingScheduler::new(
        source,
        AnalysisCache::new(),
        store.clone(),
        vec!["BTCUSDT".into()],
        settings(Duration::from_secs(60)),
    );

    assert_eq!(scheduler.run_cycle().await.persisted, 1);
    let second = scheduler.run_cycle().await;
    assert_eq!(second.persisted, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(store.event_count().unwrap(), 1);
}

#[tokio::test]
async fn test_short_history_is_degraded_and_not_persisted() {
    let source = ScriptedSource::new(&[("NEWUSDT", trending(3, 1.0))]);
    let cache = AnalysisCache::new();
    let store = store();
    let scheduler = PollingScheduler::new(
        source,
        cache.clone(),
        store.clone(),
        vec!["NEWUSDT".into()],
        settings(Duration::from_secs(60)),
    );

    let report = scheduler.run_cycle().await;
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);

    let snapshot = cache.get("NEWUSDT").unwrap();
    assert!(snapshot.error.as_deref().unwrap().contains("Insufficient history"));
    assert_eq!(snapshot.sma, Stance::Unavailable);
    assert_eq!(store.event_count().unwrap(), 0);
}

#[tokio::test]
async fn test_start_and_stop() {
    let source = ScriptedSource::new(&[("BTCUSDT", trending(40, 100.0))]);
    let scheduler = PollingScheduler::new(
        source.clone(),
        AnalysisCache::new(),
        store(),
        vec!["BTCUSDT".into()],
        settings(Duration::from_millis(20)),
    );

    let handle = scheduler.start().expect("first start spawns the loop");
    assert!(scheduler.is_active());
    assert!(scheduler.start().is_none());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(source.calls.load(Ordering::SeqCst) >= 2);

    scheduler.stop();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop exits after stop")
        .unwrap();
    assert!(!scheduler.is_active());

    let calls = source.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), calls);
}
