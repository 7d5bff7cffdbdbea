//! # REST API for Shift Templates
//!
//! Creating a template fills its generation window immediately; editing the
//! recurrence reconciles pending instances; deactivating retires them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use tracing::info;

use super::error_response;
use crate::io::rest::mappers::template_mapper::TemplateMapper;
use crate::AppState;
use shared::{CreateShiftTemplateRequest, SetActiveRequest, UpdateShiftTemplateRequest};

/// Create a router for shift template APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/households/:household_id/shift-templates", post(create_shift_template))
        .route(
            "/households/:household_id/shift-templates/:template_id",
            get(get_shift_template).put(update_shift_template),
        )
        .route(
            "/households/:household_id/shift-templates/:template_id/active",
            put(set_shift_template_active),
        )
}

pub async fn create_shift_template(
    State(state): State<AppState>,
    Path(household_id): Path<String>,
    Json(request): Json<CreateShiftTemplateRequest>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/shift-templates - request: {:?}", household_id, request);

    let command = TemplateMapper::to_create_shift_command(request);
    match state
        .shift_template_service
        .create_template(&household_id, command, Utc::now())
        .await
    {
        Ok(result) => (
            StatusCode::CREATED,
            Json(TemplateMapper::to_shift_template_response(result)),
        )
            .into_response(),
        Err(e) => error_response("Failed to create shift template", e),
    }
}

pub async fn get_shift_template(
    State(state): State<AppState>,
    Path((household_id, template_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/households/{}/shift-templates/{}", household_id, template_id);

    match state
        .shift_template_service
        .get_template(&household_id, &template_id)
        .await
    {
        Ok(template) => (StatusCode::OK, Json(TemplateMapper::to_shift_template_dto(template))).into_response(),
        Err(e) => error_response("Failed to get shift template", e),
    }
}

pub async fn update_shift_template(
    State(state): State<AppState>,
    Path((household_id, template_id)): Path<(String, String)>,
    Json(request): Json<UpdateShiftTemplateRequest>,
) -> impl IntoResponse {
    info!(
        "PUT /api/households/{}/shift-templates/{} - request: {:?}",
        household_id, template_id, request
    );

    let command = TemplateMapper::to_update_shift_command(request);
    match state
        .shift_template_service
        .update_template(&household_id, &template_id, command, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(TemplateMapper::to_shift_template_response(result))).into_response(),
        Err(e) => error_response("Failed to update shift template", e),
    }
}

pub async fn set_shift_template_active(
    State(state): State<AppState>,
    Path((household_id, template_id)): Path<(String, String)>,
    Json(request): Json<SetActiveRequest>,
) -> impl IntoResponse {
    info!(
        "PUT /api/households/{}/shift-templates/{}/active - is_active: {}",
        household_id, template_id, request.is_active
    );

    match state
        .shift_template_service
        .set_active(&household_id, &template_id, request.is_active, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(TemplateMapper::to_shift_template_response(result))).into_response(),
        Err(e) => error_response("Failed to change shift template state", e),
    }
}

