//! Session lifecycle endpoints: status, health, QR, pairing, new-session.

use super::{check_auth, failure, store_error, ApiState};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use chrono::Utc;
use herald_core::phone::format_phone_number;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

/// `GET /api/status` -- connection/session snapshot.
pub(super) async fn status(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let session = state
        .store
        .get_session(&state.deployment_id)
        .await
        .map_err(store_error)?;

    let conn_state = state.messenger.state().await;
    let connected = conn_state.is_open();
    let qr_available = session.as_ref().is_some_and(|s| s.qr_code.is_some());
    let pairing_available = session.as_ref().is_some_and(|s| s.pairing_code.is_some());

    let message = if connected {
        "WhatsApp connected"
    } else if qr_available {
        "QR available - scan to pair"
    } else if pairing_available {
        "Pairing code available"
    } else {
        "Initializing..."
    };

    Ok(Json(json!({
        "success": true,
        "connected": connected,
        "state": conn_state.label(),
        "has_session": session.is_some(),
        "qr_available": qr_available,
        "pairing_code_available": pairing_available,
        "connection_type": session.as_ref().and_then(|s| s.connection_type.clone()),
        "phone_number": session.as_ref().and_then(|s| s.phone_number.clone()),
        "message": message,
    })))
}

/// `GET /api/health` -- liveness with database and connection status.
pub(super) async fn health(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let whatsapp = if state.messenger.state().await.is_open() {
        "connected"
    } else {
        "disconnected"
    };
    let database = if state.store.ping().await {
        "connected"
    } else {
        "disconnected"
    };

    Ok(Json(json!({
        "status": "running",
        "database": database,
        "whatsapp": whatsapp,
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// `GET /api/qr` -- the rendered login QR if one is pending.
pub(super) async fn qr(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let session = state
        .store
        .get_session(&state.deployment_id)
        .await
        .map_err(store_error)?;

    match session.and_then(|s| s.qr_code) {
        Some(qr) => Ok(Json(json!({
            "success": true,
            "qr": qr,
            "message": "Scan with WhatsApp within 2 minutes",
        }))),
        None => Ok(Json(json!({
            "success": false,
            "message": "QR code generating... Please wait and refresh",
        }))),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct PairingParams {
    number: Option<String>,
}

/// `GET /api/pairing-code?number=<phone>` -- request a pairing code.
pub(super) async fn pairing_code(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Query(params): Query<PairingParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let Some(number) = params.number.filter(|n| !n.trim().is_empty()) else {
        return Ok(failure("Phone number is required"));
    };

    let formatted = format_phone_number(&number, &state.country_code);

    match state.messenger.request_pairing_code(&formatted).await {
        Ok(code) => Ok(Json(json!({
            "success": true,
            "pairing_code": code,
            "phone_number": formatted,
            "message": "Pairing code generated successfully",
            "instructions": [
                "1. Open WhatsApp on your phone",
                "2. Go to Settings > Linked Devices > Link a Device",
                "3. Select \"Link with phone number\"",
                format!("4. Enter this code: {code}"),
                "5. Wait for connection confirmation",
            ],
        }))),
        Err(e) => {
            error!("pairing code generation failed: {e}");
            Ok(failure(format!("Pairing code generation failed: {e}")))
        }
    }
}

/// `POST /api/new-session` -- discard all session state and restart the
/// handshake.
pub(super) async fn new_session(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    match state.messenger.reset_session().await {
        Ok(()) => Ok(Json(json!({
            "success": true,
            "message": "New session creation started",
        }))),
        Err(e) => {
            error!("new session failed: {e}");
            Ok(failure(e.to_string()))
        }
    }
}
