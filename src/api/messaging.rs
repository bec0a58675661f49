//! Send endpoints: single, bulk, personalized bulk, and detection sweeps.

use super::{check_auth, failure, parse_contact_list, store_error, ApiState};
use crate::bulk::{self, BulkOptions, FixedDelay, Pacer, SendJob};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use herald_core::phone::format_phone_number;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

#[derive(Debug, Deserialize)]
pub(super) struct SendMessageBody {
    number: String,
    message: String,
}

/// `POST /api/send-message` -- single send.
pub(super) async fn send_message(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if body.number.trim().is_empty() || body.message.trim().is_empty() {
        return Ok(failure("Number and message are required"));
    }
    if !state.messenger.state().await.is_open() {
        return Ok(failure("WhatsApp not connected"));
    }

    let number = format_phone_number(&body.number, &state.country_code);

    match state.messenger.send_text(&number, &body.message).await {
        Ok(()) => {
            if let Err(e) = state.store.record_send(&number).await {
                error!("contact update failed after send to {number}: {e}");
            }
            Ok(Json(json!({
                "success": true,
                "message": "Message sent successfully",
            })))
        }
        Err(e) => Ok(failure(format!("Failed to send message: {e}"))),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SendBulkBody {
    contacts: Option<Value>,
    message: String,
    delay_ms: Option<u64>,
    send_to: Option<String>,
    image_base64: Option<String>,
    verify: Option<bool>,
}

/// `POST /api/send-bulk` -- throttled sequential bulk send.
///
/// `contacts` is an array or newline-separated string; when omitted the
/// stored contacts selected by `send_to` (`active` | `new` | `all`) are used.
pub(super) async fn send_bulk(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(body): Json<SendBulkBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if body.message.trim().is_empty() {
        return Ok(failure("Message is required"));
    }
    if !state.messenger.state().await.is_open() {
        return Ok(failure("WhatsApp not connected"));
    }

    let mut numbers: Vec<String> = body
        .contacts
        .as_ref()
        .map(parse_contact_list)
        .unwrap_or_default();

    if numbers.is_empty() {
        let send_to = body.send_to.as_deref().unwrap_or("active");
        numbers = state
            .store
            .contacts_for_send(send_to)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(|c| c.phone_number)
            .collect();
    }

    if numbers.is_empty() {
        return Ok(failure("No contacts to send to"));
    }

    let image = match &body.image_base64 {
        Some(encoded) => match BASE64.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(_) => return Ok(failure("Invalid image encoding")),
        },
        None => None,
    };

    let jobs: Vec<SendJob> = numbers
        .iter()
        .map(|n| SendJob {
            destination: n.clone(),
            text: body.message.clone(),
        })
        .collect();

    let opts = BulkOptions {
        image,
        verify: body.verify.unwrap_or(state.bulk.verify_numbers),
        country_code: state.country_code.clone(),
    };
    let mut pacer = FixedDelay::from_millis(body.delay_ms.unwrap_or(state.bulk.default_delay_ms));

    let report = bulk::run_bulk(state.messenger.as_ref(), &state.store, &jobs, &opts, &mut pacer)
        .await;

    Ok(Json(json!({
        "success": true,
        "results": report.results,
        "sent": report.sent,
        "failed": report.failed,
        "total": report.total,
        "message": format!("Sent {}/{} messages successfully", report.sent, report.total),
    })))
}

#[derive(Debug, Deserialize)]
pub(super) struct SmartBulkBody {
    template: String,
    delay_ms: Option<u64>,
}

/// `POST /api/smart-bulk` -- personalized bulk to active stored contacts.
pub(super) async fn smart_bulk(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(body): Json<SmartBulkBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if body.template.trim().is_empty() {
        return Ok(failure("Message template is required"));
    }
    if !state.messenger.state().await.is_open() {
        return Ok(failure("WhatsApp not connected"));
    }

    let contacts = state
        .store
        .contacts_for_send("active")
        .await
        .map_err(store_error)?;

    if contacts.is_empty() {
        return Ok(failure("No active contacts found"));
    }

    let jobs: Vec<SendJob> = contacts
        .iter()
        .map(|c| SendJob {
            destination: c.phone_number.clone(),
            text: bulk::personalize(&body.template, c),
        })
        .collect();

    let opts = BulkOptions {
        image: None,
        verify: false,
        country_code: state.country_code.clone(),
    };
    let mut pacer = FixedDelay::from_millis(body.delay_ms.unwrap_or(state.bulk.default_delay_ms));

    let report = bulk::run_bulk(state.messenger.as_ref(), &state.store, &jobs, &opts, &mut pacer)
        .await;

    Ok(Json(json!({
        "success": true,
        "results": report.results,
        "sent": report.sent,
        "failed": report.failed,
        "total": report.total,
        "personalization": true,
        "message": format!("Smart messaging completed: {} personalized messages sent", report.sent),
    })))
}

#[derive(Debug, Deserialize)]
pub(super) struct DetectBody {
    numbers: Vec<String>,
}

/// `POST /api/detect-active` -- registration sweep over a capped batch,
/// recording detected numbers as active contacts.
pub(super) async fn detect_active(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(body): Json<DetectBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if body.numbers.is_empty() {
        return Ok(failure("Numbers array is required"));
    }
    if !state.messenger.state().await.is_open() {
        return Ok(failure("WhatsApp not connected"));
    }

    let batch: Vec<&String> = body.numbers.iter().take(state.bulk.detection_limit).collect();
    let mut results = Vec::with_capacity(batch.len());
    let mut active = 0usize;

    let mut pacer = FixedDelay::from_millis(state.bulk.detection_delay_ms);

    for (i, number) in batch.iter().enumerate() {
        let formatted = format_phone_number(number, &state.country_code);

        match state.messenger.is_registered(&formatted).await {
            Ok(true) => {
                active += 1;
                if let Err(e) = state.store.record_detected(&formatted).await {
                    error!("failed to record detected contact {formatted}: {e}");
                }
                results.push(json!({"number": number, "status": "active"}));
            }
            Ok(false) => {
                results.push(json!({"number": number, "status": "inactive"}));
            }
            Err(e) => {
                results.push(json!({"number": number, "status": "error", "error": e.to_string()}));
            }
        }

        // Fixed gap between checks to stay under the service's rate limits.
        if i + 1 < batch.len() {
            pacer.pause().await;
        }
    }

    let total = results.len();
    let percentage = if total > 0 {
        (active as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    Ok(Json(json!({
        "success": true,
        "results": results,
        "total": total,
        "active": active,
        "inactive": total - active,
        "active_percentage": format!("{percentage:.2}"),
    })))
}
