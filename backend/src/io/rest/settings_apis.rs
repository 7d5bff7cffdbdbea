//! # REST API for Runtime Settings
//!
//! Process-wide overrides land in `app_config`; household overrides are
//! limited to the household-scoped keys. Values are checked before storing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::put,
    Router,
};
use chrono::Utc;
use tracing::info;

use super::error_response;
use crate::AppState;
use shared::{SetSettingRequest, SetSettingResponse};

/// Create a router for settings APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", put(set_process_setting))
        .route("/households/:household_id/settings", put(set_household_setting))
}

fn saved(request: SetSettingRequest) -> SetSettingResponse {
    SetSettingResponse {
        key: request.key,
        value: request.value,
        success_message: "Setting saved".to_string(),
    }
}

pub async fn set_process_setting(
    State(state): State<AppState>,
    Json(request): Json<SetSettingRequest>,
) -> impl IntoResponse {
    info!("PUT /api/settings - request: {:?}", request);

    match state
        .settings_service
        .set_process_value(&request.key, &request.value, Utc::now())
        .await
    {
        Ok(()) => (StatusCode::OK, Json(saved(request))).into_response(),
        Err(e) => error_response("Failed to save setting", e),
    }
}

pub async fn set_household_setting(
    State(state): State<AppState>,
    Path(household_id): Path<String>,
    Json(request): Json<SetSettingRequest>,
) -> impl IntoResponse {
    info!("PUT /api/households/{}/settings - request: {:?}", household_id, request);

    match state
        .settings_service
        .set_household_value(&household_id, &request.key, &request.value, Utc::now())
        .await
    {
        Ok(()) => (StatusCode::OK, Json(saved(request))).into_response(),
        Err(e) => error_response("Failed to save household setting", e),
    }
}
