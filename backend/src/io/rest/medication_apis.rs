//! # REST API for Medications and Medication Schedules
//!
//! A medication owns any number of schedules, each with its own recurrence.
//! PRN medications take no schedules into generation; doses are logged
//! through the care log endpoints instead.

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
use crate::domain::commands::medications::AddScheduleCommand;
use crate::io::rest::mappers::recurrence_mapper::RecurrenceMapper;
use crate::io::rest::mappers::template_mapper::TemplateMapper;
use crate::AppState;
use shared::{
    CreateMedicationRequest, MedicationScheduleRequest, SetActiveRequest, UpdateMedicationRequest,
};

/// Create a router for medication APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/households/:household_id/medications", post(create_medication))
        .route(
            "/households/:household_id/medications/:medication_id",
            get(get_medication).put(update_medication),
        )
        .route(
            "/households/:household_id/medications/:medication_id/discontinue",
            post(discontinue_medication),
        )
        .route(
            "/households/:household_id/medications/:medication_id/schedules",
            post(add_schedule),
        )
        .route(
            "/households/:household_id/medication-schedules/:schedule_id",
            get(get_schedule).put(update_schedule),
        )
        .route(
            "/households/:household_id/medication-schedules/:schedule_id/active",
            put(set_schedule_active),
        )
}

pub async fn create_medication(
    State(state): State<AppState>,
    Path(household_id): Path<String>,
    Json(request): Json<CreateMedicationRequest>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/medications - request: {:?}", household_id, request);

    let command = TemplateMapper::to_create_medication_command(request);
    match state
        .medication_service
        .create_medication(&household_id, command, Utc::now())
        .await
    {
        Ok(medication) => (StatusCode::CREATED, Json(TemplateMapper::to_medication_dto(medication))).into_response(),
        Err(e) => error_response("Failed to create medication", e),
    }
}

pub async fn get_medication(
    State(state): State<AppState>,
    Path((household_id, medication_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/households/{}/medications/{}", household_id, medication_id);

    match state
        .medication_service
        .get_medication(&household_id, &medication_id)
        .await
    {
        Ok(medication) => (StatusCode::OK, Json(TemplateMapper::to_medication_dto(medication))).into_response(),
        Err(e) => error_response("Failed to get medication", e),
    }
}

/// Update medication details; toggling PRN reconciles its schedules
pub async fn update_medication(
    State(state): State<AppState>,
    Path((household_id, medication_id)): Path<(String, String)>,
    Json(request): Json<UpdateMedicationRequest>,
) -> impl IntoResponse {
    info!(
        "PUT /api/households/{}/medications/{} - request: {:?}",
        household_id, medication_id, request
    );

    let command = TemplateMapper::to_update_medication_command(request);
    match state
        .medication_service
        .update_medication(&household_id, &medication_id, command, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(TemplateMapper::to_medication_response(result))).into_response(),
        Err(e) => error_response("Failed to update medication", e),
    }
}

pub async fn discontinue_medication(
    State(state): State<AppState>,
    Path((household_id, medication_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/medications/{}/discontinue", household_id, medication_id);

    match state
        .medication_service
        .discontinue(&household_id, &medication_id, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(TemplateMapper::to_medication_response(result))).into_response(),
        Err(e) => error_response("Failed to discontinue medication", e),
    }
}

pub async fn add_schedule(
    State(state): State<AppState>,
    Path((household_id, medication_id)): Path<(String, String)>,
    Json(request): Json<MedicationScheduleRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/households/{}/medications/{}/schedules - request: {:?}",
        household_id, medication_id, request
    );

    let command = AddScheduleCommand {
        recurrence: RecurrenceMapper::to_input(request.recurrence),
    };
    match state
        .medication_service
        .add_schedule(&household_id, &medication_id, command, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::CREATED, Json(TemplateMapper::to_schedule_response(result))).into_response(),
        Err(e) => error_response("Failed to add medication schedule", e),
    }
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Path((household_id, schedule_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/households/{}/medication-schedules/{}", household_id, schedule_id);

    match state
        .medication_service
        .get_schedule(&household_id, &schedule_id)
        .await
    {
        Ok(schedule) => (StatusCode::OK, Json(TemplateMapper::to_schedule_dto(schedule))).into_response(),
        Err(e) => error_response("Failed to get medication schedule", e),
    }
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Path((household_id, schedule_id)): Path<(String, String)>,
    Json(request): Json<MedicationScheduleRequest>,
) -> impl IntoResponse {
    info!(
        "PUT /api/households/{}/medication-schedules/{} - request: {:?}",
        household_id, schedule_id, request
    );

    let recurrence = RecurrenceMapper::to_input(request.recurrence);
    match state
        .medication_service
        .update_schedule(&household_id, &schedule_id, recurrence, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(TemplateMapper::to_schedule_response(result))).into_response(),
        Err(e) => error_response("Failed to update medication schedule", e),
    }
}

pub async fn set_schedule_active(
    State(state): State<AppState>,
    Path((household_id, schedule_id)): Path<(String, String)>,
    Json(request): Json<SetActiveRequest>,
) -> impl IntoResponse {
    info!(
        "PUT /api/households/{}/medication-schedules/{}/active - is_active: {}",
        household_id, schedule_id, request.is_active
    );

    match state
        .medication_service
        .set_schedule_active(&household_id, &schedule_id, request.is_active, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(TemplateMapper::to_schedule_response(result))).into_response(),
        Err(e) => error_response("Failed to change medication schedule state", e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::io::rest::test_support::{decode, send};
    use crate::test_app;
    use shared::{Household, Medication, MedicationResponse, MedicationScheduleResponse, Recipient};

    #[tokio::test]
    async fn test_schedule_generates_until_discontinued() {
        let (_db, _state, router) = test_app::router().await;
        let (_, body) = send(&router, Method::POST, "/api/households", Some(json!({"name": "Home"}))).await;
        let household: Household = decode(body);
        let (_, body) = send(
            &router,
            Method::POST,
            &format!("/api/households/{}/recipients", household.id),
            Some(json!({"name_enc": "enc:r", "timezone": "Europe/Berlin"})),
        )
        .await;
        let recipient: Recipient = decode(body);

        let base = format!("/api/households/{}/medications", household.id);
        let (status, body) = send(
            &router,
            Method::POST,
            &base,
            Some(json!({"recipient_id": recipient.id, "name_enc": "enc:m", "dosage_enc": "enc:5mg"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let medication: Medication = decode(body);
        assert!(!medication.is_prn);

        let (status, body) = send(
            &router,
            Method::POST,
            &format!("{}/{}/schedules", base, medication.id),
            Some(json!({"recurrence": {"frequency": "daily", "times_of_day": ["09:00", "21:00"]}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let schedule: MedicationScheduleResponse = decode(body);
        assert_eq!(schedule.schedule.medication_id, medication.id);
        assert!(schedule.generated > 0);

        let (status, body) = send(&router, Method::POST, &format!("{}/{}/discontinue", base, medication.id), None).await;
        assert_eq!(status, StatusCode::OK);
        let discontinued: MedicationResponse = decode(body);
        assert!(!discontinued.medication.is_active);
        assert!(discontinued.removed > 0);
    }
}
