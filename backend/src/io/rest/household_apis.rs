//! # REST API for Households and Care Recipients
//!
//! Creating a household, adding recipients, and changing a recipient's
//! timezone. A timezone change reconciles every pending instance of the
//! recipient onto the new local wall-clock times.

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
use crate::io::rest::mappers::household_mapper::HouseholdMapper;
use crate::AppState;
use shared::{CreateHouseholdRequest, CreateRecipientRequest, UpdateTimezoneRequest};

/// Create a router for household and recipient APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/households", post(create_household))
        .route("/households/:household_id/recipients", post(create_recipient))
        .route(
            "/households/:household_id/recipients/:recipient_id",
            get(get_recipient),
        )
        .route(
            "/households/:household_id/recipients/:recipient_id/timezone",
            put(update_timezone),
        )
}

/// Create a new household
pub async fn create_household(
    State(state): State<AppState>,
    Json(request): Json<CreateHouseholdRequest>,
) -> impl IntoResponse {
    info!("POST /api/households - request: {:?}", request);

    let command = HouseholdMapper::to_create_household_command(request);
    match state.recipient_service.create_household(command, Utc::now()).await {
        Ok(household) => (
            StatusCode::CREATED,
            Json(HouseholdMapper::to_household_dto(household)),
        )
            .into_response(),
        Err(e) => error_response("Failed to create household", e),
    }
}

/// Add a care recipient to a household
pub async fn create_recipient(
    State(state): State<AppState>,
    Path(household_id): Path<String>,
    Json(request): Json<CreateRecipientRequest>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/recipients - timezone: {}", household_id, request.timezone);

    let command = HouseholdMapper::to_create_recipient_command(request);
    match state
        .recipient_service
        .create_recipient(&household_id, command, Utc::now())
        .await
    {
        Ok(recipient) => (
            StatusCode::CREATED,
            Json(HouseholdMapper::to_recipient_dto(recipient)),
        )
            .into_response(),
        Err(e) => error_response("Failed to create recipient", e),
    }
}

pub async fn get_recipient(
    State(state): State<AppState>,
    Path((household_id, recipient_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/households/{}/recipients/{}", household_id, recipient_id);

    match state
        .recipient_service
        .get_recipient(&household_id, &recipient_id)
        .await
    {
        Ok(recipient) => (StatusCode::OK, Json(HouseholdMapper::to_recipient_dto(recipient))).into_response(),
        Err(e) => error_response("Failed to get recipient", e),
    }
}

/// Change a recipient's timezone and reconcile pending instances
pub async fn update_timezone(
    State(state): State<AppState>,
    Path((household_id, recipient_id)): Path<(String, String)>,
    Json(request): Json<UpdateTimezoneRequest>,
) -> impl IntoResponse {
    info!(
        "PUT /api/households/{}/recipients/{}/timezone - request: {:?}",
        household_id, recipient_id, request
    );

    match state
        .recipient_service
        .update_timezone(&household_id, &recipient_id, &request.timezone, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(HouseholdMapper::to_timezone_response(result))).into_response(),
        Err(e) => error_response("Failed to update timezone", e),
    }
}
