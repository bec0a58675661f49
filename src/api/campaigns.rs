//! Campaign CRUD and execution.

use super::{check_auth, failure, parse_contact_list, store_error, ApiState};
use crate::bulk::{self, BulkOptions, FixedDelay, SendJob};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// `GET /api/campaigns`
pub(super) async fn list(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let campaigns = state.store.list_campaigns().await.map_err(store_error)?;
    Ok(Json(json!({"success": true, "campaigns": campaigns})))
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateCampaignBody {
    name: String,
    message: String,
    /// Array of numbers or one newline-separated string.
    contacts: Value,
}

/// `POST /api/campaigns` -- create a draft campaign.
pub(super) async fn create(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(body): Json<CreateCampaignBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if body.name.trim().is_empty() || body.message.trim().is_empty() {
        return Ok(failure("Name and message are required"));
    }

    let contacts = parse_contact_list(&body.contacts);
    if contacts.is_empty() {
        return Ok(failure("Contacts are required"));
    }

    let campaign = state
        .store
        .create_campaign(body.name.trim(), &body.message, &contacts)
        .await
        .map_err(store_error)?;

    Ok(Json(json!({"success": true, "campaign": campaign})))
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RunCampaignBody {
    delay_ms: Option<u64>,
}

/// `POST /api/campaigns/{id}/run` -- execute the campaign's bulk send and
/// persist its counters.
pub(super) async fn run(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Option<Json<RunCampaignBody>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let Some(campaign) = state.store.get_campaign(&id).await.map_err(store_error)? else {
        return Ok(failure("Campaign not found"));
    };

    if campaign.contacts.is_empty() {
        return Ok(failure("Campaign has no contacts"));
    }
    if !state.messenger.state().await.is_open() {
        return Ok(failure("WhatsApp not connected"));
    }

    state
        .store
        .mark_campaign_running(&id)
        .await
        .map_err(store_error)?;

    let jobs: Vec<SendJob> = campaign
        .contacts
        .iter()
        .map(|n| SendJob {
            destination: n.clone(),
            text: campaign.message.clone(),
        })
        .collect();

    let opts = BulkOptions {
        image: None,
        verify: false,
        country_code: state.country_code.clone(),
    };
    let delay_ms = body
        .and_then(|Json(b)| b.delay_ms)
        .unwrap_or(state.bulk.default_delay_ms);
    let mut pacer = FixedDelay::from_millis(delay_ms);

    let report = bulk::run_bulk(state.messenger.as_ref(), &state.store, &jobs, &opts, &mut pacer)
        .await;

    state
        .store
        .record_campaign_result(&id, report.sent as i64, report.failed as i64)
        .await
        .map_err(store_error)?;

    Ok(Json(json!({
        "success": true,
        "campaign_id": id,
        "results": report.results,
        "sent": report.sent,
        "failed": report.failed,
        "total": report.total,
        "message": format!("Campaign completed: {}/{} sent successfully", report.sent, report.total),
    })))
}
