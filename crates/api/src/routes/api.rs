use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use common::Signal;
use engine::HISTORY_CAPACITY;

use crate::AppState;

const DEFAULT_LIMIT: usize = 10;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/signals", get(get_signals))
        .route("/assets", get(get_assets))
        .route("/status", get(get_status))
}

// ─── Signals ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SignalsQuery {
    limit: Option<usize>,
}

async fn get_signals(
    State(state): State<AppState>,
    Query(q): Query<SignalsQuery>,
) -> Json<Vec<Signal>> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).min(HISTORY_CAPACITY);
    Json(state.signals.recent_signals(limit).await)
}

// ─── Assets ───────────────────────────────────────────────────────────────────

async fn get_assets(State(state): State<AppState>) -> Json<Vec<String>> {
    match state.source.available_assets().await {
        Ok(assets) => Json(assets),
        Err(e) => {
            warn!(error = %e, "Failed to list available assets");
            Json(Vec::new())
        }
    }
}

// ─── Status ───────────────────────────────────────────────────────────────────

async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.signals.status().await;
    Json(json!({
        "connected": state.source.is_connected().await,
        "demo": state.is_demo,
        "last_signal_time": status.last_signal_time,
        "total_signals_generated": status.total_signals_generated,
        "signals_today": state.signals.signals_today().await,
    }))
}
