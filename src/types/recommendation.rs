use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{CombinedSignal, Stance};

/// Kind of comparison metric attached to a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Overall stance unchanged; value is the share of indicators that held.
    Match,
    /// Overall stance flipped; value is the share of indicators that changed.
    Risk,
    /// No prior event to compare against.
    NotApplicable,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Match => "match",
            MetricKind::Risk => "risk",
            MetricKind::NotApplicable => "not_applicable",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match" => Ok(MetricKind::Match),
            "risk" => Ok(MetricKind::Risk),
            "not_applicable" => Ok(MetricKind::NotApplicable),
            other => Err(format!("unknown metric kind '{}'", other)),
        }
    }
}

/// Format an instant the way it is stored: ISO-8601, UTC, `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an ISO-8601 instant, normalizing to UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// One immutable row of the recommendation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationEvent {
    pub timestamp: DateTime<Utc>,
    pub instrument: String,
    pub overall: Stance,
    pub previous_overall: Option<Stance>,
    pub metric_kind: MetricKind,
    /// Percentage in [0, 100], two decimals.
    pub metric_value: f64,
    pub details: String,
}

/// Most recently persisted state for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestState {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub overall: Stance,
    pub sma: Stance,
    pub rsi: Stance,
    pub bb: Stance,
    pub last_price: f64,
}

/// A freshly computed (or client-submitted) signal offered for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSubmission {
    pub instrument: String,
    pub signal: CombinedSignal,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Why a submission was or was not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    FirstObservation,
    IntervalElapsed,
    PriceMoved,
    WithinWindow,
    DegradedSignal,
}

/// Result of running the gating policy for one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistOutcome {
    pub persisted: bool,
    pub reason: GateReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<RecommendationEvent>,
}

/// A page of recommendation events, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub events: Vec<RecommendationEvent>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}
