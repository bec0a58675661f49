//! Contact CRUD and stats.

use super::{check_auth, failure, store_error, ApiState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use herald_core::phone::format_phone_number;
use herald_store::NewContact;
use serde::Deserialize;
use serde_json::{json, Value};

/// `GET /api/contacts` -- most recently contacted first.
pub(super) async fn list(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let contacts = state.store.list_contacts(100).await.map_err(store_error)?;
    Ok(Json(json!({"success": true, "contacts": contacts})))
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateContactBody {
    phone_number: String,
    name: Option<String>,
    business_type: Option<String>,
    location: Option<String>,
    /// Array of strings or one comma-separated string.
    tags: Option<Value>,
}

fn parse_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// `POST /api/contacts` -- create or refresh a contact.
pub(super) async fn create(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(body): Json<CreateContactBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if body.phone_number.trim().is_empty() {
        return Ok(failure("Phone number is required"));
    }

    let new = NewContact {
        phone_number: format_phone_number(&body.phone_number, &state.country_code),
        name: body.name,
        business_type: body.business_type,
        location: body.location,
        tags: body.tags.as_ref().map(parse_tags).unwrap_or_default(),
        source: None,
    };

    let contact = state.store.upsert_contact(&new).await.map_err(store_error)?;
    Ok(Json(json!({"success": true, "contact": contact})))
}

/// `GET /api/contacts/stats` -- totals and by-location breakdown.
pub(super) async fn stats(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let stats = state.store.contact_stats().await.map_err(store_error)?;

    let by_location: Vec<Value> = stats
        .by_location
        .iter()
        .map(|(location, count)| json!({"location": location, "count": count}))
        .collect();

    Ok(Json(json!({
        "success": true,
        "total_contacts": stats.total,
        "active_contacts": stats.active,
        "inactive_contacts": stats.inactive,
        "by_location": by_location,
    })))
}
