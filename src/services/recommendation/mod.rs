//! Recommendation history: gating policy plus the persisted log.

pub mod gating;
pub mod store;

pub use gating::{compute_metric, price_change_ratio, GateDecision, GatingPolicy, Metric};
pub use store::{normalize_instrument, EventQuery, RecommendationStore, MAX_PAGE_SIZE};
