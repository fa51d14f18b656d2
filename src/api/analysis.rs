//! Analysis snapshot endpoints.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::Result;
use crate::types::{AnalysisSnapshot, Stance};
use crate::AppState;

use super::ApiResponse;

/// Compact view of a cached snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub symbol: String,
    pub overall: Stance,
    pub sma: Stance,
    pub rsi: Stance,
    pub bb: Stance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<i64>,
}

impl From<&AnalysisSnapshot> for SnapshotSummary {
    fn from(snapshot: &AnalysisSnapshot) -> Self {
        Self {
            symbol: snapshot.symbol.clone(),
            overall: snapshot.overall,
            sma: snapshot.sma,
            rsi: snapshot.rsi,
            bb: snapshot.bb,
            last_price: snapshot.last_price(),
            computed_at: snapshot.computed_at,
        }
    }
}

/// Create the analysis router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_snapshots))
        .route("/:symbol", get(get_snapshot))
}

/// Full snapshot for one instrument; empty if never computed.
async fn get_snapshot(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<ApiResponse<AnalysisSnapshot>> {
    let snapshot = state.cache.get_snapshot(&symbol);
    Json(ApiResponse::new(snapshot.as_ref().clone()))
}

/// Summaries of every cached snapshot.
async fn list_snapshots(State(state): State<AppState>) -> Json<ApiResponse<Vec<SnapshotSummary>>> {
    let summaries = state
        .cache
        .symbols()
        .iter()
        .filter_map(|symbol| state.cache.get(symbol))
        .map(|snapshot| SnapshotSummary::from(snapshot.as_ref()))
        .collect();

    Json(ApiResponse::new(summaries))
}

/// Tradable symbols discovered from the market data source.
pub async fn list_symbols(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<String>>>> {
    let symbols = state
        .symbols
        .symbols(&state.config.market_data.quote_asset)
        .await?;
    Ok(Json(ApiResponse::new(symbols)))
}
