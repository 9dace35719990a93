use axum::{extract::State, routing::get, Json, Router};
use chrono::Local;
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

async fn root() -> Json<Value> {
    Json(json!({ "status": "running", "service": "Signal Bot" }))
}

/// Healthy only while the market data source reports a live connection.
async fn health(State(state): State<AppState>) -> Json<Value> {
    if state.source.is_connected().await {
        Json(json!({
            "status": "healthy",
            "timestamp": Local::now().to_rfc3339(),
        }))
    } else {
        Json(json!({
            "status": "unhealthy",
            "error": "Not connected to market data source",
        }))
    }
}
