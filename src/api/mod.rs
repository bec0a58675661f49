//! HTTP API server.
//!
//! Thin handlers translating JSON bodies into calls on the store and the
//! messenger. Domain failures (not connected, unknown ids, bad input) come
//! back as `200 {"success": false, "error": ...}`; infrastructure failures
//! as 5xx; auth failures as 401.

mod campaigns;
mod categories;
mod contacts;
mod messaging;
mod session;

#[cfg(test)]
mod tests;

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use herald_core::config::{ApiConfig, BulkConfig};
use herald_core::traits::Messenger;
use herald_store::Store;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub messenger: Arc<dyn Messenger>,
    pub store: Store,
    pub deployment_id: String,
    pub country_code: String,
    pub bulk: BulkConfig,
    pub api_key: Option<String>,
    pub uptime: Instant,
}

/// Constant-time string comparison to prevent timing attacks on API token
/// validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)`
/// if rejected.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<(StatusCode, Json<Value>)> {
    let key = match api_key {
        Some(k) => k,
        None => return None, // No auth configured -- allow all.
    };

    let header = match headers.get("authorization") {
        Some(h) => h,
        None => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "missing Authorization header"})),
            ));
        }
    };

    let value = match header.to_str() {
        Ok(v) => v,
        Err(_) => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid Authorization header"})),
            ));
        }
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => None, // Authorized.
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

/// `{"success": false, "error": ...}` with HTTP 200 -- the shape callers of
/// the original service expect for domain failures.
fn failure(msg: impl Into<String>) -> Json<Value> {
    Json(json!({"success": false, "error": msg.into()}))
}

/// Map a store error to a 500 response.
fn store_error(e: herald_core::error::HeraldError) -> (StatusCode, Json<Value>) {
    error!("store error: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
}

/// Accept a contact list as either a JSON array of strings or one
/// newline-separated string.
fn parse_contact_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Build the axum router with shared state.
fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(session::status))
        .route("/api/health", get(session::health))
        .route("/api/qr", get(session::qr))
        .route("/api/pairing-code", get(session::pairing_code))
        .route("/api/new-session", post(session::new_session))
        .route("/api/send-message", post(messaging::send_message))
        .route("/api/send-bulk", post(messaging::send_bulk))
        .route("/api/smart-bulk", post(messaging::smart_bulk))
        .route("/api/detect-active", post(messaging::detect_active))
        .route(
            "/api/contacts",
            get(contacts::list).post(contacts::create),
        )
        .route("/api/contacts/stats", get(contacts::stats))
        .route(
            "/api/categories",
            get(categories::list).post(categories::create),
        )
        .route("/api/categories/{id}/send", post(categories::send))
        .route(
            "/api/campaigns",
            get(campaigns::list).post(campaigns::create),
        )
        .route("/api/campaigns/{id}/run", post(campaigns::run))
        .layer(axum::extract::DefaultBodyLimit::max(50 * 1024 * 1024))
        .with_state(state)
}

/// Start the API server. Blocks until shutdown.
pub async fn serve(state: ApiState, config: &ApiConfig) {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(state).layer(cors_layer(config));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("API server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("API server listening on {addr}");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal");
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("API server error: {e}");
    }
}
