//! HTTP server for inbound platform requests.
//!
//! Exposes the two handler entry points of the [`Kasumi`] facade over JSON
//! HTTP, which is how the platform reaches a registered app.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/v1/search` | Dispatch a search to registered spiders |
//! | `POST` | `/v1/info` | Describe this app's search surface |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response Contract
//!
//! Every decodable request is answered `200 OK` with an envelope:
//!
//! ```json
//! { "code": 1001, "message": "authorization failed: ...", "data": [] }
//! ```
//!
//! `code` 0 is success; non-zero codes classify handled failures (see
//! [`crate::protocol::code`]). Bodies that fail to parse as JSON are
//! rejected by the transport itself with a 4xx status before reaching the
//! handlers.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the platform relays
//! browser-originated searches whose preflight requests land here directly.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::app::Kasumi;
use crate::error::Result;
use crate::protocol::{InfoRequest, InfoResponse, SearchRequest, SearchResponse};

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    app: Arc<Kasumi>,
}

/// Starts the platform-facing HTTP server.
///
/// Binds to the address from the config's `bind` field and serves until
/// the process is terminated. This is what [`Kasumi::run_forever`] calls;
/// use `serve` directly when the host wants to keep its own handle on the
/// facade while it runs.
///
/// # Returns
///
/// Returns `Ok(())` when the server shuts down, or an error if binding or
/// the listener itself fails.
pub async fn serve(app: Arc<Kasumi>) -> Result<()> {
    let bind_addr = app.config().bind().to_string();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/v1/search", post(handle_search))
        .route("/v1/info", post(handle_info))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { app });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "kasumi app listening for platform requests");

    axum::serve(listener, router).await?;

    Ok(())
}

// ============ POST /v1/search ============

/// Handler for `POST /v1/search`.
///
/// Delegates to [`Kasumi::handle_request_search`]; all handled failures
/// come back as non-zero envelopes, so this handler is infallible at the
/// HTTP level.
async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Json<SearchResponse> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("search", %request_id);
    let response = state
        .app
        .handle_request_search(&request)
        .instrument(span)
        .await;
    Json(response)
}

// ============ POST /v1/info ============

/// Handler for `POST /v1/info`.
async fn handle_info(
    State(state): State<AppState>,
    Json(request): Json<InfoRequest>,
) -> Json<InfoResponse> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("info", %request_id);
    let response = state
        .app
        .handle_request_info(&request)
        .instrument(span)
        .await;
    Json(response)
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

/// Handler for `GET /health`.
///
/// Used by load balancers and by the platform's liveness probe.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
