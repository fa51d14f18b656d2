//! Recommendation history endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::services::recommendation::{normalize_instrument, MAX_PAGE_SIZE};
use crate::services::EventQuery;
use crate::types::{
    parse_timestamp, CombinedSignal, EventPage, LatestState, PersistOutcome, RecommendationEvent,
    SignalSubmission, Stance,
};
use crate::AppState;

use super::ApiResponse;

/// Query parameters for the history listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub symbol: Option<String>,
    /// Look-back window in hours.
    pub hours: Option<i64>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// Client-submitted signal. Field aliases accept the legacy form.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub symbol: Option<String>,
    #[serde(alias = "recommendation")]
    pub overall: Option<String>,
    #[serde(alias = "sma_rec")]
    pub sma: Option<String>,
    #[serde(alias = "rsi_rec")]
    pub rsi: Option<String>,
    #[serde(alias = "bb_rec")]
    pub bb: Option<String>,
    pub timestamp: Option<String>,
    pub price: Option<f64>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("missing required field '{}'", field)))
}

fn parse_stance(value: &Option<String>, field: &str) -> Result<Stance> {
    required(value, field)?
        .parse()
        .map_err(|e| AppError::Validation(format!("{}: {}", field, e)))
}

impl SubmitRequest {
    /// Validate into a submission. `fallback_price` covers clients that
    /// omit the price (the cached snapshot's last close).
    pub fn into_submission(self, fallback_price: Option<f64>) -> Result<SignalSubmission> {
        let instrument = normalize_instrument(required(&self.symbol, "symbol")?);

        let overall = parse_stance(&self.overall, "overall")?;
        if !overall.is_available() {
            return Err(AppError::Validation(
                "overall must be one of buy, sell or hold".to_string(),
            ));
        }

        let signal = CombinedSignal {
            sma: parse_stance(&self.sma, "sma")?,
            rsi: parse_stance(&self.rsi, "rsi")?,
            bb: parse_stance(&self.bb, "bb")?,
            overall,
        };

        let raw_timestamp = required(&self.timestamp, "timestamp")?;
        let timestamp = parse_timestamp(raw_timestamp).ok_or_else(|| {
            AppError::Validation(format!("timestamp '{}' is not ISO-8601", raw_timestamp))
        })?;

        let price = self
            .price
            .or(fallback_price)
            .ok_or_else(|| AppError::Validation("missing required field 'price'".to_string()))?;
        if !price.is_finite() || price < 0.0 {
            return Err(AppError::Validation(format!("invalid price {}", price)));
        }

        Ok(SignalSubmission {
            instrument,
            signal,
            price,
            timestamp,
        })
    }
}

/// Create the recommendations router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_recommendations).post(submit_recommendation))
        .route("/latest", get(list_latest))
        .route("/latest/:symbol", get(get_latest))
}

/// Legacy route names with snake_case payload fields.
pub fn legacy_router() -> Router<AppState> {
    Router::new()
        .route("/save_recommendation", post(submit_recommendation))
        .route("/get_recommendations", get(legacy_list))
}

/// Longest accepted look-back window (100 years).
const MAX_HISTORY_HOURS: i64 = 24 * 365 * 100;

fn history_window(hours: i64) -> Result<Duration> {
    if !(1..=MAX_HISTORY_HOURS).contains(&hours) {
        return Err(AppError::Validation(format!(
            "hours must be between 1 and {}",
            MAX_HISTORY_HOURS
        )));
    }
    Duration::try_hours(hours)
        .ok_or_else(|| AppError::Validation(format!("hours {} out of range", hours)))
}

fn build_query(state: &AppState, query: ListQuery) -> Result<EventQuery> {
    let since = history_window(query.hours.unwrap_or(state.config.history_hours))?;
    let page_size = query.page_size.unwrap_or(state.config.default_page_size);
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(AppError::Validation(format!(
            "pageSize must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    Ok(EventQuery {
        instrument: query.symbol.filter(|s| !s.trim().is_empty()),
        since,
        page: query.page.unwrap_or(1).max(1),
        page_size,
    })
}

/// Paginated event history, newest first.
async fn list_recommendations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<EventPage>>> {
    let query = build_query(&state, query)?;
    let page = state.store.list_events(&query, Utc::now())?;
    Ok(Json(ApiResponse::new(page)))
}

/// Run the gating policy on a client-submitted signal.
async fn submit_recommendation(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<ApiResponse<PersistOutcome>>> {
    let fallback_price = request
        .symbol
        .as_deref()
        .and_then(|symbol| state.cache.get(symbol))
        .and_then(|snapshot| snapshot.last_price());

    let submission = request.into_submission(fallback_price)?;
    let outcome = state.store.submit(&submission)?;
    Ok(Json(ApiResponse::new(outcome)))
}

/// Latest persisted state for every instrument.
async fn list_latest(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<LatestState>>>> {
    Ok(Json(ApiResponse::new(state.store.latest_states()?)))
}

/// Latest persisted state for one instrument.
async fn get_latest(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<LatestState>>> {
    let latest = state
        .store
        .latest_state(&symbol)?
        .ok_or_else(|| AppError::NotFound(format!("No recommendation recorded for {}", symbol)))?;
    Ok(Json(ApiResponse::new(latest)))
}

/// Plain array of events within the history window.
async fn legacy_list(State(state): State<AppState>) -> Result<Json<Vec<RecommendationEvent>>> {
    let query = EventQuery {
        instrument: None,
        since: history_window(state.config.history_hours)?,
        page: 1,
        page_size: MAX_PAGE_SIZE,
    };
    let page = state.store.list_events(&query, Utc::now())?;
    Ok(Json(page.events))
}
