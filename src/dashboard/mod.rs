//! Dashboard: Axum web server exposing race sessions as JSON.
//!
//! The API hands back annotated tables and combination lists as data;
//! rendering is left to whatever client consumes it. CORS enabled for
//! local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::future::Future;
use tower_http::cors::CorsLayer;
use tracing::info;

pub use routes::{AppState, DashboardState};

/// Bind `port` and serve the API until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server listening on http://localhost:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Dashboard server error")
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/sessions",
            get(routes::list_sessions).post(routes::create_session),
        )
        .route("/api/sessions/:id", delete(routes::close_session))
        .route("/api/sessions/:id/runners", get(routes::get_runners))
        .route("/api/sessions/:id/runners/:number", get(routes::get_runner))
        .route("/api/sessions/:id/overlays", delete(routes::reset_overlays))
        .route(
            "/api/sessions/:id/runners/:number/overlay",
            put(routes::set_overlay),
        )
        .route("/api/sessions/:id/runners/:number/mark", put(routes::set_mark))
        .route(
            "/api/sessions/:id/bet",
            get(routes::get_bet).put(routes::configure_bet),
        )
        .route("/api/sessions/:id/bet/lines", put(routes::set_line))
        .route("/api/sessions/:id/bet/remainder", post(routes::assign_remainder))
        .route("/api/sessions/:id/bet/simulate", post(routes::simulate_purchase))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
