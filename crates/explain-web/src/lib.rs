//! Axum HTTP surface for the explanation service.

pub mod routes;
pub mod state;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use explain_core::ExplainService;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/explain", post(routes::explain::explain))
        .route("/api/explain/stream", post(routes::explain::explain_stream))
        .route("/api/resolve-tenant", post(routes::tenant::resolve_tenant))
        .route("/api/refresh-schema", post(routes::tenant::refresh_schema))
        .route("/health", get(routes::health::health))
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server.
pub async fn run_server(service: Arc<ExplainService>, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(service);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Explain service listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
