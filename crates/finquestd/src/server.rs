//! HTTP server for finquestd.

use crate::routes;
use crate::store::Store;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers.
pub struct AppState {
    pub store: Store,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            start_time: Instant::now(),
        }
    }
}

/// Build the full router. Exposed so tests can drive it in-process.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::user_routes())
        .merge(routes::content_routes())
        .merge(routes::progression_routes())
        .merge(routes::practice_routes())
        .merge(routes::project_routes())
        .merge(routes::health_routes())
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until shutdown.
pub async fn run(state: AppState, listen_addr: &str) -> Result<()> {
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("Listening on http://{}", listen_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
