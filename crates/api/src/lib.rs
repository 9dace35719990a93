pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use common::MarketDataSource;
use engine::SignalHandle;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub signals: SignalHandle,
    /// Delegate for connectivity and the asset list.
    pub source: Arc<dyn MarketDataSource>,
    pub is_demo: bool,
}

/// Assemble every route with permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router())
        .merge(routes::ws_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, error = %e, "Failed to bind API listener");
            return;
        }
    };

    info!(%addr, "Signal API listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "API server stopped");
    }
}
