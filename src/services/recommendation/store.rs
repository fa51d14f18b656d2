//! SQLite-backed recommendation log and latest-state index.
//!
//! Two tables:
//! - `recommendation_events`: append-only history, one row per persisted event
//! - `latest_states`: one row per instrument, upserted on every persist
//!
//! The gating read, the event append and the state upsert share one
//! transaction under the connection lock, so no reader observes half a write
//! and two submissions for the same instrument cannot interleave.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::types::{
    format_timestamp, parse_timestamp, EventPage, LatestState, PersistOutcome,
    RecommendationEvent, SignalSubmission, Stance,
};

use super::gating::{compute_metric, GatingPolicy};

/// Largest page size served by `list_events`.
pub const MAX_PAGE_SIZE: usize = 500;

/// Filter and paging for history reads.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub instrument: Option<String>,
    /// Only events at or after `now - since` are returned.
    pub since: Duration,
    /// 1-based page index.
    pub page: usize,
    pub page_size: usize,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            instrument: None,
            since: Duration::hours(24),
            page: 1,
            page_size: 20,
        }
    }
}

/// Normalize an instrument identifier to exchange form.
pub fn normalize_instrument(instrument: &str) -> String {
    instrument.trim().to_uppercase()
}

/// Event row as stored, before validation.
struct RawEvent {
    timestamp: String,
    instrument: String,
    overall: String,
    previous_overall: Option<String>,
    metric_kind: String,
    metric_value: f64,
    details: String,
}

impl RawEvent {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            timestamp: row.get(0)?,
            instrument: row.get(1)?,
            overall: row.get(2)?,
            previous_overall: row.get(3)?,
            metric_kind: row.get(4)?,
            metric_value: row.get(5)?,
            details: row.get(6)?,
        })
    }

    fn into_event(self) -> Result<RecommendationEvent> {
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| {
            AppError::MalformedRecord(format!("bad timestamp '{}'", self.timestamp))
        })?;
        let previous_overall = self
            .previous_overall
            .map(|s| s.parse::<Stance>())
            .transpose()
            .map_err(AppError::MalformedRecord)?;

        if !self.metric_value.is_finite() || !(0.0..=100.0).contains(&self.metric_value) {
            return Err(AppError::MalformedRecord(format!(
                "metric value {} out of range",
                self.metric_value
            )));
        }

        Ok(RecommendationEvent {
            timestamp,
            instrument: self.instrument,
            overall: self.overall.parse().map_err(AppError::MalformedRecord)?,
            previous_overall,
            metric_kind: self.metric_kind.parse().map_err(AppError::MalformedRecord)?,
            metric_value: self.metric_value,
            details: self.details,
        })
    }
}

/// Latest-state row as stored, before validation.
struct RawState {
    instrument: String,
    timestamp: String,
    overall: String,
    sma: String,
    rsi: String,
    bb: String,
    last_price: f64,
}

impl RawState {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            instrument: row.get(0)?,
            timestamp: row.get(1)?,
            overall: row.get(2)?,
            sma: row.get(3)?,
            rsi: row.get(4)?,
            bb: row.get(5)?,
            last_price: row.get(6)?,
        })
    }

    fn into_state(self) -> Result<LatestState> {
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| {
            AppError::MalformedRecord(format!("bad timestamp '{}'", self.timestamp))
        })?;
        Ok(LatestState {
            instrument: self.instrument,
            timestamp,
            overall: self.overall.parse().map_err(AppError::MalformedRecord)?,
            sma: self.sma.parse().map_err(AppError::MalformedRecord)?,
            rsi: self.rsi.parse().map_err(AppError::MalformedRecord)?,
            bb: self.bb.parse().map_err(AppError::MalformedRecord)?,
            last_price: self.last_price,
        })
    }
}

const STATE_COLUMNS: &str =
    "instrument, timestamp, overall, sma_stance, rsi_stance, bb_stance, last_price";
const EVENT_COLUMNS: &str =
    "timestamp, instrument, overall, previous_overall, metric_kind, metric_value, details";

/// Recommendation log plus latest-state table, with the gating policy.
pub struct RecommendationStore {
    conn: Mutex<Connection>,
    policy: GatingPolicy,
}

impl RecommendationStore {
    /// Open (or create) a store at the given path.
    pub fn new<P: AsRef<Path>>(path: P, policy: GatingPolicy) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            policy,
        };
        store.init_schema()?;
        info!("Recommendation store initialized");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn new_in_memory(policy: GatingPolicy) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            policy,
        };
        store.init_schema()?;
        debug!("In-memory recommendation store initialized");
        Ok(store)
    }

    pub fn policy(&self) -> &GatingPolicy {
        &self.policy
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("recommendation store lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS recommendation_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                instrument TEXT NOT NULL,
                overall TEXT NOT NULL,
                previous_overall TEXT,
                metric_kind TEXT NOT NULL,
                metric_value REAL NOT NULL,
                details TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_instrument
             ON recommendation_events(instrument, timestamp DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_timestamp
             ON recommendation_events(timestamp DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS latest_states (
                instrument TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                overall TEXT NOT NULL,
                sma_stance TEXT NOT NULL,
                rsi_stance TEXT NOT NULL,
                bb_stance TEXT NOT NULL,
                last_price REAL NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    // ========== Gated Writes ==========

    /// Run the gating policy for a submission and persist it if warranted.
    pub fn submit(&self, submission: &SignalSubmission) -> Result<PersistOutcome> {
        let instrument = normalize_instrument(&submission.instrument);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let latest = match read_latest(&tx, &instrument)? {
            Some(raw) => match raw.into_state() {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!("Ignoring unreadable latest state for {}: {}", instrument, e);
                    None
                }
            },
            None => None,
        };

        let decision = self.policy.decide(
            latest.as_ref(),
            &submission.signal,
            submission.price,
            submission.timestamp,
        );

        if !decision.should_persist() {
            debug!(
                "Skipping {} ({:?}): {:?}",
                instrument,
                submission.signal.overall,
                decision.reason()
            );
            return Ok(PersistOutcome {
                persisted: false,
                reason: decision.reason(),
                event: None,
            });
        }

        let metric = compute_metric(&instrument, latest.as_ref(), &submission.signal);
        let event = RecommendationEvent {
            timestamp: submission.timestamp,
            instrument: instrument.clone(),
            overall: submission.signal.overall,
            previous_overall: latest.as_ref().map(|s| s.overall),
            metric_kind: metric.kind,
            metric_value: metric.value,
            details: metric.details,
        };

        if let Err(e) = write_event(&tx, &event, submission) {
            error!("Failed to persist recommendation for {}: {}", instrument, e);
            return Err(e);
        }
        tx.commit()?;

        info!(
            "Recorded {} for {} at {:.6} ({:?})",
            event.overall,
            instrument,
            submission.price,
            decision.reason()
        );

        Ok(PersistOutcome {
            persisted: true,
            reason: decision.reason(),
            event: Some(event),
        })
    }

    // ========== Reads ==========

    /// Latest persisted state for one instrument.
    pub fn latest_state(&self, instrument: &str) -> Result<Option<LatestState>> {
        let conn = self.lock()?;
        match read_latest(&conn, &normalize_instrument(instrument))? {
            Some(raw) => raw.into_state().map(Some),
            None => Ok(None),
        }
    }

    /// Latest states for all instruments; unreadable rows are skipped.
    pub fn latest_states(&self) -> Result<Vec<LatestState>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM latest_states ORDER BY instrument",
            STATE_COLUMNS
        ))?;

        let states = stmt
            .query_map([], RawState::from_row)?
            .filter_map(|row| match row.map_err(AppError::from).and_then(RawState::into_state) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!("Skipping malformed latest state: {}", e);
                    None
                }
            })
            .collect();

        Ok(states)
    }

    /// Page through events newer than `now - query.since`, newest first.
    ///
    /// A window reaching past the representable range has no lower bound.
    pub fn list_events(&self, query: &EventQuery, now: DateTime<Utc>) -> Result<EventPage> {
        let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
        let page = query.page.max(1);
        let threshold = now.checked_sub_signed(query.since);
        let instrument = query.instrument.as_deref().map(normalize_instrument);

        let mut sql = format!("SELECT {} FROM recommendation_events", EVENT_COLUMNS);
        let mut filters = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(instrument) = instrument {
            args.push(instrument);
            filters.push(format!("instrument = ?{}", args.len()));
        }
        // Stored timestamps are fixed-width RFC3339 with `Z`, so text order is time order.
        if let Some(threshold) = threshold {
            args.push(format_timestamp(&threshold));
            filters.push(format!("timestamp >= ?{}", args.len()));
        }
        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filters.join(" AND "));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");

        let events: Vec<RecommendationEvent> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&sql)?;
            let rows =
                stmt.query_map(params_from_iter(args.iter()), |row| Ok(RawEvent::from_row(row)))?;

            let mut events = Vec::new();
            for row in rows {
                let parsed = row
                    .and_then(|raw| raw)
                    .map_err(AppError::from)
                    .and_then(RawEvent::into_event);
                match parsed {
                    Ok(event) => events.push(event),
                    Err(e) => warn!("Skipping malformed recommendation row: {}", e),
                }
            }
            events
        };

        let total = events.len();
        let total_pages = total.div_ceil(page_size);
        let events = events
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(EventPage {
            events,
            page,
            page_size,
            total,
            total_pages,
        })
    }

    /// Total number of stored events, including unreadable ones.
    pub fn event_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM recommendation_events", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn read_latest(conn: &Connection, instrument: &str) -> Result<Option<RawState>> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {} FROM latest_states WHERE instrument = ?1",
                STATE_COLUMNS
            ),
            params![instrument],
            RawState::from_row,
        )
        .optional()?;
    Ok(raw)
}

fn write_event(
    tx: &Transaction<'_>,
    event: &RecommendationEvent,
    submission: &SignalSubmission,
) -> Result<()> {
    let timestamp = format_timestamp(&event.timestamp);

    tx.execute(
        &format!(
            "INSERT INTO recommendation_events ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            EVENT_COLUMNS
        ),
        params![
            timestamp,
            event.instrument,
            event.overall.as_str(),
            event.previous_overall.map(|s| s.as_str()),
            event.metric_kind.as_str(),
            event.metric_value,
            event.details,
        ],
    )?;

    tx.execute(
        &format!(
            "INSERT INTO latest_states ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(instrument) DO UPDATE SET
                timestamp = excluded.timestamp,
                overall = excluded.overall,
                sma_stance = excluded.sma_stance,
                rsi_stance = excluded.rsi_stance,
                bb_stance = excluded.bb_stance,
                last_price = excluded.last_price",
            STATE_COLUMNS
        ),
        params![
            event.instrument,
            timestamp,
            submission.signal.overall.as_str(),
            submission.signal.sma.as_str(),
            submission.signal.rsi.as_str(),
            submission.signal.bb.as_str(),
            submission.price,
        ],
    )?;

    Ok(())
}
