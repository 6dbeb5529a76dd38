//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::dispatch::{self, DmResponse};
use super::state::AppState;
use crate::dm;
use crate::error::DmError;

/// Endpoint path the device fleet posts to.
pub const DM_ENDPOINT: &str = "/palmcsext/swupdateserver";

/// Transport header carrying the authentication tuple.
pub const HMAC_HEADER: &str = "x-syncml-hmac";

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(DM_ENDPOINT, post(dm_endpoint))
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/sessions", get(list_sessions))
        .route("/api/updates/check", get(check_updates))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main protocol endpoint.
async fn dm_endpoint(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > state.config.max_body_size {
        return (StatusCode::PAYLOAD_TOO_LARGE, "body too large").into_response();
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let hmac_header = headers
        .get(HMAC_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match dispatch::handle_request(
        &state,
        content_type.as_deref(),
        hmac_header.as_deref(),
        &body,
    )
    .await
    {
        Ok(response) => dm_response(response),
        Err(err) => {
            warn!(%err, "request failed before dispatch");
            let status = match &err {
                DmError::SessionBusy(_) => StatusCode::CONFLICT,
                DmError::Decode(_) | DmError::Protocol(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, err.to_string()).into_response()
        }
    }
}

fn dm_response(response: DmResponse) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, response.content_type);
    if let Some(hmac) = &response.hmac {
        builder = builder.header(HMAC_HEADER, hmac);
    }
    builder
        .body(axum::body::Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always "ok" when the server is up.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
}

/// Health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Status endpoint.
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session_count = state.sessions.count().await;

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "server_id": state.config.server_id,
        "uptime_secs": state.uptime().as_secs(),
        "active_sessions": session_count,
        "packages": state.registry.len(),
    }))
}

/// Live session listing (debug endpoint).
async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "sessions": state.sessions.summaries().await,
    }))
}

/// Parameters for the direct update check.
#[derive(Deserialize)]
pub struct UpdateCheckParams {
    /// Current device build (e.g. `Nova-3.0.5-86`).
    #[serde(default)]
    pub build: String,
    /// Software version fallback (e.g. `3.0.5`).
    #[serde(default)]
    pub swv: String,
}

/// Direct update check, bypassing the DM exchange.
///
/// Serves devices whose update daemon polls over plain HTTP instead of
/// running a management session.
async fn check_updates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateCheckParams>,
) -> impl IntoResponse {
    let device_build = if params.build.is_empty() {
        params.swv
    } else {
        params.build
    };

    if device_build.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "status": "error",
                "message": "Missing build or swv parameter",
                "updateAvailable": false,
            })),
        );
    }

    let selected = dm::evaluate(&device_build, state.registry.packages());

    if selected.is_empty() {
        return (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "updateAvailable": false,
                "currentBuild": device_build,
            })),
        );
    }

    let packages: Vec<_> = selected
        .iter()
        .map(|pkg| {
            serde_json::json!({
                "name": pkg.name,
                "version": pkg.version,
                "filename": pkg.filename,
                "url": pkg.url,
                "size": pkg.size,
                "md5": pkg.md5,
                "description": pkg.description,
                "targetBuild": pkg.target_build,
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "updateAvailable": true,
            "currentBuild": device_build,
            "packageCount": packages.len(),
            "packages": packages,
        })),
    )
}
