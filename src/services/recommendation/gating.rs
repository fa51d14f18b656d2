//! Decides whether a computed signal becomes a logged event, and what
//! comparison metric the event carries.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::GatingConfig;
use crate::types::{CombinedSignal, GateReason, LatestState, MetricKind};

/// Outcome of the gating rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Persist(GateReason),
    Skip(GateReason),
}

impl GateDecision {
    pub fn should_persist(&self) -> bool {
        matches!(self, GateDecision::Persist(_))
    }

    pub fn reason(&self) -> GateReason {
        match self {
            GateDecision::Persist(reason) | GateDecision::Skip(reason) => *reason,
        }
    }
}

/// Time-elapsed-or-price-change persistence policy.
#[derive(Debug, Clone)]
pub struct GatingPolicy {
    pub save_interval: Duration,
    pub price_change_threshold: f64,
    pub persist_degraded: bool,
}

impl Default for GatingPolicy {
    fn default() -> Self {
        Self::from(&GatingConfig::default())
    }
}

impl From<&GatingConfig> for GatingPolicy {
    fn from(config: &GatingConfig) -> Self {
        Self {
            save_interval: config.save_interval,
            price_change_threshold: config.price_change_threshold,
            persist_degraded: config.persist_degraded,
        }
    }
}

/// Relative price move against the last persisted price.
///
/// `None` when the reference price is zero or unusable, in which case any
/// move counts as significant.
pub fn price_change_ratio(last_price: f64, current_price: f64) -> Option<f64> {
    if last_price == 0.0 || !last_price.is_finite() {
        return None;
    }
    Some((current_price - last_price).abs() / last_price.abs())
}

impl GatingPolicy {
    /// Apply the gating rule to a signal observed at `now` for `price`.
    pub fn decide(
        &self,
        latest: Option<&LatestState>,
        signal: &CombinedSignal,
        price: f64,
        now: DateTime<Utc>,
    ) -> GateDecision {
        if signal.is_degraded() && !self.persist_degraded {
            return GateDecision::Skip(GateReason::DegradedSignal);
        }

        let Some(latest) = latest else {
            return GateDecision::Persist(GateReason::FirstObservation);
        };

        // Negative elapsed (out-of-order timestamps) never satisfies the interval.
        let interval_elapsed = (now - latest.timestamp)
            .to_std()
            .map(|elapsed| elapsed >= self.save_interval)
            .unwrap_or(false);
        if interval_elapsed {
            return GateDecision::Persist(GateReason::IntervalElapsed);
        }

        let price_moved = match price_change_ratio(latest.last_price, price) {
            Some(ratio) => ratio >= self.price_change_threshold,
            None => true,
        };
        if price_moved {
            return GateDecision::Persist(GateReason::PriceMoved);
        }

        GateDecision::Skip(GateReason::WithinWindow)
    }
}

/// Comparison metric attached to a persisted event.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub kind: MetricKind,
    pub value: f64,
    pub details: String,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compare the new signal with the previously persisted state.
///
/// Unavailable indicators on either side count as neither held nor changed.
pub fn compute_metric(
    instrument: &str,
    previous: Option<&LatestState>,
    current: &CombinedSignal,
) -> Metric {
    let Some(previous) = previous else {
        return Metric {
            kind: MetricKind::NotApplicable,
            value: 0.0,
            details: format!("First recommendation recorded for {}.", instrument),
        };
    };

    let pairs = [
        (previous.sma, current.sma),
        (previous.rsi, current.rsi),
        (previous.bb, current.bb),
    ];
    let comparable = pairs
        .iter()
        .filter(|(before, after)| before.is_available() && after.is_available());

    if current.overall == previous.overall {
        let held = comparable.filter(|(before, after)| before == after).count();
        Metric {
            kind: MetricKind::Match,
            value: round2(held as f64 / 3.0 * 100.0),
            details: format!(
                "Recommendation held at '{}'. Matching indicators: {}/3.",
                current.overall, held
            ),
        }
    } else {
        let changed = comparable.filter(|(before, after)| before != after).count();
        Metric {
            kind: MetricKind::Risk,
            value: round2(changed as f64 / 3.0 * 100.0),
            details: format!(
                "Recommendation changed from '{}' to '{}'. Changed indicators: {}/3.",
                previous.overall, current.overall, changed
            ),
        }
    }
}
