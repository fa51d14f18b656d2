//! Recommendation Store Tests
//!
//! Exercises the gated write path against an in-memory SQLite store:
//! - First observation bootstraps the log
//! - Interval and price-move triggers, including their boundaries
//! - History window filtering and pagination

use chrono::{DateTime, Duration, TimeZone, Utc};
use vigil::services::{EventQuery, GatingPolicy, RecommendationStore};
use vigil::{CombinedSignal, GateReason, MetricKind, SignalSubmission, Stance};

fn policy() -> GatingPolicy {
    GatingPolicy {
        save_interval: std::time::Duration::from_secs(3600),
        price_change_threshold: 0.03,
        persist_degraded: false,
    }
}

fn store() -> RecommendationStore {
    RecommendationStore::new_in_memory(policy()).expect("in-memory store")
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn signal(overall: Stance, sma: Stance, rsi: Stance, bb: Stance) -> CombinedSignal {
    CombinedSignal {
        sma,
        rsi,
        bb,
        overall,
    }
}

fn submission(
    instrument: &str,
    signal: CombinedSignal,
    price: f64,
    timestamp: DateTime<Utc>,
) -> SignalSubmission {
    SignalSubmission {
        instrument: instrument.to_string(),
        signal,
        price,
        timestamp,
    }
}

fn hold_signal() -> CombinedSignal {
    signal(Stance::Hold, Stance::Hold, Stance::Hold, Stance::Hold)
}

#[test]
fn test_first_observation_persists_not_applicable() {
    let store = store();
    let outcome = store
        .submit(&submission("BTCUSDT", hold_signal(), 100.0, base_time()))
        .unwrap();

    assert!(outcome.persisted);
    assert_eq!(outcome.reason, GateReason::FirstObservation);

    let event = outcome.event.unwrap();
    assert_eq!(event.metric_kind, MetricKind::NotApplicable);
    assert_eq!(event.metric_value, 0.0);
    assert_eq!(event.previous_overall, None);
    assert_eq!(event.details, "First recommendation recorded for BTCUSDT.");

    let latest = store.latest_state("btcusdt").unwrap().unwrap();
    assert_eq!(latest.last_price, 100.0);
    assert_eq!(latest.timestamp, base_time());
}

#[test]
fn test_identical_submission_is_idempotent() {
    let store = store();
    let sub = submission("BTCUSDT", hold_signal(), 100.0, base_time());

    assert!(store.submit(&sub).unwrap().persisted);
    let second = store.submit(&sub).unwrap();

    assert!(!second.persisted);
    assert_eq!(second.reason, GateReason::WithinWindow);
    assert_eq!(store.event_count().unwrap(), 1);
}

#[test]
fn test_interval_boundary_is_inclusive() {
    let store = store();
    store
        .submit(&submission("ETHUSDT", hold_signal(), 100.0, base_time()))
        .unwrap();

    let almost = base_time() + Duration::seconds(3599);
    let skipped = store
        .submit(&submission("ETHUSDT", hold_signal(), 100.0, almost))
        .unwrap();
    assert!(!skipped.persisted);

    let exact = base_time() + Duration::seconds(3600);
    let persisted = store
        .submit(&submission("ETHUSDT", hold_signal(), 100.0, exact))
        .unwrap();
    assert!(persisted.persisted);
    assert_eq!(persisted.reason, GateReason::IntervalElapsed);

    let event = persisted.event.unwrap();
    assert_eq!(event.metric_kind, MetricKind::Match);
    assert_eq!(event.metric_value, 100.0);
    assert_eq!(event.previous_overall, Some(Stance::Hold));
}

#[test]
fn test_price_move_boundary_is_inclusive() {
    let store = store();
    store
        .submit(&submission("SOLUSDT", hold_signal(), 100.0, base_time()))
        .unwrap();

    let later = base_time() + Duration::minutes(5);
    let small = store
        .submit(&submission("SOLUSDT", hold_signal(), 102.9, later))
        .unwrap();
    assert!(!small.persisted);

    let exact = store
        .submit(&submission("SOLUSDT", hold_signal(), 103.0, later))
        .unwrap();
    assert!(exact.persisted);
    assert_eq!(exact.reason, GateReason::PriceMoved);

    // Reference price is now 103, so a drop back to 100 is under 3%.
    let back = store
        .submit(&submission("SOLUSDT", hold_signal(), 100.0, later))
        .unwrap();
    assert!(!back.persisted);
}

#[test]
fn test_stance_change_records_risk() {
    let store = store();
    store
        .submit(&submission(
            "BNBUSDT",
            signal(Stance::Sell, Stance::Sell, Stance::Sell, Stance::Hold),
            100.0,
            base_time(),
        ))
        .unwrap();

    let outcome = store
        .submit(&submission(
            "BNBUSDT",
            signal(Stance::Buy, Stance::Buy, Stance::Buy, Stance::Hold),
            110.0,
            base_time() + Duration::minutes(1),
        ))
        .unwrap();

    let event = outcome.event.unwrap();
    assert_eq!(event.metric_kind, MetricKind::Risk);
    assert_eq!(event.metric_value, 66.67);
    assert_eq!(event.previous_overall, Some(Stance::Sell));
    assert_eq!(
        event.details,
        "Recommendation changed from 'sell' to 'buy'. Changed indicators: 2/3."
    );
}

#[test]
fn test_degraded_signal_not_persisted() {
    let store = store();
    let degraded = signal(Stance::Hold, Stance::Hold, Stance::Unavailable, Stance::Hold);

    let outcome = store
        .submit(&submission("XRPUSDT", degraded, 0.5, base_time()))
        .unwrap();
    assert!(!outcome.persisted);
    assert_eq!(outcome.reason, GateReason::DegradedSignal);
    assert!(store.latest_state("XRPUSDT").unwrap().is_none());
}

#[test]
fn test_degraded_signal_persisted_when_enabled() {
    let store = RecommendationStore::new_in_memory(GatingPolicy {
        persist_degraded: true,
        ..policy()
    })
    .unwrap();
    let degraded = signal(Stance::Hold, Stance::Hold, Stance::Unavailable, Stance::Hold);

    let outcome = store
        .submit(&submission("XRPUSDT", degraded, 0.5, base_time()))
        .unwrap();
    assert!(outcome.persisted);
    assert_eq!(
        store.latest_state("XRPUSDT").unwrap().unwrap().rsi,
        Stance::Unavailable
    );
}

#[test]
fn test_history_window_and_pagination() {
    let store = store();
    let now = base_time();

    // Hourly events over the last 30 hours; only 25 fall in the 24h window
    // (hours 0..=24, since the boundary is inclusive).
    for hours_ago in (0..30).rev() {
        let ts = now - Duration::hours(hours_ago);
        let outcome = store
            .submit(&submission("BTCUSDT", hold_signal(), 100.0, ts))
            .unwrap();
        assert!(outcome.persisted, "event {} hours ago", hours_ago);
    }

    let query = EventQuery {
        instrument: None,
        since: Duration::hours(24),
        page: 1,
        page_size: 10,
    };
    let first = store.list_events(&query, now).unwrap();
    assert_eq!(first.total, 25);
    assert_eq!(first.total_pages, 3);
    assert_eq!(first.events.len(), 10);
    assert_eq!(first.events[0].timestamp, now);
    assert!(first
        .events
        .windows(2)
        .all(|pair| pair[0].timestamp >= pair[1].timestamp));

    let last = store
        .list_events(&EventQuery { page: 3, ..query.clone() }, now)
        .unwrap();
    assert_eq!(last.events.len(), 5);
    assert_eq!(last.events[4].timestamp, now - Duration::hours(24));

    let beyond = store
        .list_events(&EventQuery { page: 4, ..query }, now)
        .unwrap();
    assert!(beyond.events.is_empty());
    assert_eq!(beyond.total, 25);
}

#[test]
fn test_store_survives_reopen() {
    let path = std::env::temp_dir().join(format!(
        "vigil-gating-{}-{}.db",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    {
        let store = RecommendationStore::new(&path, policy()).unwrap();
        store
            .submit(&submission("BTCUSDT", hold_signal(), 100.0, base_time()))
            .unwrap();
    }

    let reopened = RecommendationStore::new(&path, policy()).unwrap();
    assert_eq!(reopened.event_count().unwrap(), 1);
    let outcome = reopened
        .submit(&submission(
            "BTCUSDT",
            hold_signal(),
            100.0,
            base_time() + Duration::minutes(1),
        ))
        .unwrap();
    assert!(!outcome.persisted);

    drop(reopened);
    let _ = std::fs::remove_file(&path);
}
