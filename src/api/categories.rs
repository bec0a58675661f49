//! Category CRUD and category-targeted bulk sends.

use super::{check_auth, failure, store_error, ApiState};
use crate::bulk::{self, BulkOptions, FixedDelay, SendJob};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use herald_store::CategoryFilters;
use serde::Deserialize;
use serde_json::{json, Value};

/// `GET /api/categories`
pub(super) async fn list(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let categories = state.store.list_categories().await.map_err(store_error)?;
    Ok(Json(json!({"success": true, "categories": categories})))
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateCategoryBody {
    name: String,
    description: Option<String>,
    color: Option<String>,
    #[serde(default)]
    filters: Option<CategoryFilters>,
}

/// `POST /api/categories`
pub(super) async fn create(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Json(body): Json<CreateCategoryBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if body.name.trim().is_empty() {
        return Ok(failure("Category name is required"));
    }

    let filters = body.filters.unwrap_or_default();
    let category = state
        .store
        .create_category(
            body.name.trim(),
            body.description.as_deref(),
            body.color.as_deref(),
            &filters,
        )
        .await
        .map_err(store_error)?;

    Ok(Json(json!({"success": true, "category": category})))
}

#[derive(Debug, Deserialize)]
pub(super) struct CategorySendBody {
    message: String,
    delay_ms: Option<u64>,
}

/// `POST /api/categories/{id}/send` -- personalized bulk to the category's
/// resolved contacts.
pub(super) async fn send(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<CategorySendBody>,
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

    let Some(category) = state.store.get_category(&id).await.map_err(store_error)? else {
        return Ok(failure("Category not found"));
    };

    let contacts = state
        .store
        .contacts_in_category(&category)
        .await
        .map_err(store_error)?;

    if contacts.is_empty() {
        return Ok(failure("No contacts found in this category"));
    }

    let jobs: Vec<SendJob> = contacts
        .iter()
        .map(|c| SendJob {
            destination: c.phone_number.clone(),
            text: bulk::personalize(&body.message, c),
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
        "category": category.name,
        "results": report.results,
        "sent": report.sent,
        "failed": report.failed,
        "total": report.total,
    })))
}
