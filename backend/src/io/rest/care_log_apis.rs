//! # REST API for the Care Log
//!
//! Completing, skipping and annotating tasks, recording medication
//! administrations, and logging ad-hoc work (one-off tasks and PRN doses).
//! Outcomes only apply to pending instances; anything else is a conflict.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{post, put},
    Router,
};
use chrono::Utc;
use tracing::info;

use super::error_response;
use crate::domain::models::{MedicationAdministration, TaskInstance};
use crate::io::rest::mappers::care_log_mapper::CareLogMapper;
use crate::AppState;
use shared::{
    AdministrationResponse, AnnotateRequest, CreateAdHocTaskRequest, LogPrnDoseRequest,
    RecordAdministrationRequest, TaskOutcomeRequest, TaskResponse,
};

/// Create a router for care log APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/households/:household_id/tasks", post(create_ad_hoc_task))
        .route("/households/:household_id/tasks/:task_id/complete", post(complete_task))
        .route("/households/:household_id/tasks/:task_id/skip", post(skip_task))
        .route("/households/:household_id/tasks/:task_id/notes", put(annotate_task))
        .route(
            "/households/:household_id/administrations/:administration_id/record",
            post(record_administration),
        )
        .route(
            "/households/:household_id/administrations/:administration_id/notes",
            put(annotate_administration),
        )
        .route("/households/:household_id/prn-doses", post(log_prn_dose))
}

fn task_response(task: TaskInstance, message: &str) -> TaskResponse {
    TaskResponse {
        task: CareLogMapper::to_task_dto(task),
        success_message: message.to_string(),
    }
}

fn administration_response(
    log: MedicationAdministration,
    message: &str,
) -> AdministrationResponse {
    AdministrationResponse {
        administration: CareLogMapper::to_administration_dto(log),
        success_message: message.to_string(),
    }
}

/// Create a one-off task that no template owns
pub async fn create_ad_hoc_task(
    State(state): State<AppState>,
    Path(household_id): Path<String>,
    Json(request): Json<CreateAdHocTaskRequest>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/tasks - request: {:?}", household_id, request);

    let command = match CareLogMapper::to_ad_hoc_task_command(request) {
        Ok(command) => command,
        Err(e) => return error_response("Invalid ad-hoc task", e),
    };
    match state
        .care_log_service
        .create_ad_hoc_task(&household_id, command, Utc::now())
        .await
    {
        Ok(task) => (StatusCode::CREATED, Json(task_response(task, "Task created"))).into_response(),
        Err(e) => error_response("Failed to create task", e),
    }
}

pub async fn complete_task(
    State(state): State<AppState>,
    Path((household_id, task_id)): Path<(String, String)>,
    Json(request): Json<TaskOutcomeRequest>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/tasks/{}/complete - actor: {}", household_id, task_id, request.actor_id);

    let command = CareLogMapper::to_outcome_command(request);
    match state
        .care_log_service
        .complete_task(&household_id, &task_id, command, Utc::now())
        .await
    {
        Ok(task) => (StatusCode::OK, Json(task_response(task, "Task completed"))).into_response(),
        Err(e) => error_response("Failed to complete task", e),
    }
}

pub async fn skip_task(
    State(state): State<AppState>,
    Path((household_id, task_id)): Path<(String, String)>,
    Json(request): Json<TaskOutcomeRequest>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/tasks/{}/skip - actor: {}", household_id, task_id, request.actor_id);

    let command = CareLogMapper::to_outcome_command(request);
    match state
        .care_log_service
        .skip_task(&household_id, &task_id, command, Utc::now())
        .await
    {
        Ok(task) => (StatusCode::OK, Json(task_response(task, "Task skipped"))).into_response(),
        Err(e) => error_response("Failed to skip task", e),
    }
}

pub async fn annotate_task(
    State(state): State<AppState>,
    Path((household_id, task_id)): Path<(String, String)>,
    Json(request): Json<AnnotateRequest>,
) -> impl IntoResponse {
    info!("PUT /api/households/{}/tasks/{}/notes", household_id, task_id);

    match state
        .care_log_service
        .annotate_task(&household_id, &task_id, request.notes_enc)
        .await
    {
        Ok(task) => (StatusCode::OK, Json(task_response(task, "Notes saved"))).into_response(),
        Err(e) => error_response("Failed to annotate task", e),
    }
}

pub async fn record_administration(
    State(state): State<AppState>,
    Path((household_id, administration_id)): Path<(String, String)>,
    Json(request): Json<RecordAdministrationRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/households/{}/administrations/{}/record - outcome: {:?}",
        household_id, administration_id, request.outcome
    );

    let command = CareLogMapper::to_record_command(request);
    match state
        .care_log_service
        .record_administration(&household_id, &administration_id, command, Utc::now())
        .await
    {
        Ok(log) => (StatusCode::OK, Json(administration_response(log, "Administration recorded"))).into_response(),
        Err(e) => error_response("Failed to record administration", e),
    }
}

pub async fn annotate_administration(
    State(state): State<AppState>,
    Path((household_id, administration_id)): Path<(String, String)>,
    Json(request): Json<AnnotateRequest>,
) -> impl IntoResponse {
    info!("PUT /api/households/{}/administrations/{}/notes", household_id, administration_id);

    match state
        .care_log_service
        .annotate_administration(&household_id, &administration_id, request.notes_enc)
        .await
    {
        Ok(log) => (StatusCode::OK, Json(administration_response(log, "Notes saved"))).into_response(),
        Err(e) => error_response("Failed to annotate administration", e),
    }
}

/// Log an as-needed dose outside any schedule
pub async fn log_prn_dose(
    State(state): State<AppState>,
    Path(household_id): Path<String>,
    Json(request): Json<LogPrnDoseRequest>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/prn-doses - request: {:?}", household_id, request);

    let command = match CareLogMapper::to_prn_command(request) {
        Ok(command) => command,
        Err(e) => return error_response("Invalid PRN dose", e),
    };
    match state
        .care_log_service
        .log_prn_dose(&household_id, command, Utc::now())
        .await
    {
        Ok(log) => (StatusCode::CREATED, Json(administration_response(log, "Dose logged"))).into_response(),
        Err(e) => error_response("Failed to log PRN dose", e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::io::rest::mappers::timestamp;
    use crate::io::rest::test_support::{decode, send};
    use crate::test_app;
    use shared::{AdministrationResponse, Household, Medication, Recipient, TaskResponse};

    async fn recipient(router: &axum::Router) -> Recipient {
        let (_, body) = send(router, Method::POST, "/api/households", Some(json!({"name": "Home"}))).await;
        let household: Household = decode(body);
        let (_, body) = send(
            router,
            Method::POST,
            &format!("/api/households/{}/recipients", household.id),
            Some(json!({"name_enc": "enc:r", "timezone": "UTC"})),
        )
        .await;
        decode(body)
    }

    #[tokio::test]
    async fn test_ad_hoc_task_completes_once() {
        let (_db, _state, router) = test_app::router().await;
        let recipient = recipient(&router).await;
        let base = format!("/api/households/{}/tasks", recipient.household_id);

        let (status, body) = send(
            &router,
            Method::POST,
            &base,
            Some(json!({
                "recipient_id": recipient.id,
                "title_enc": "enc:pick up prescription",
                "scheduled_at": timestamp(&(Utc::now() + Duration::hours(1))),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: TaskResponse = decode(body);
        assert_eq!(created.task.template_id, None);
        assert_eq!(created.task.status, "pending");

        let uri = format!("{}/{}/complete", base, created.task.id);
        let outcome = json!({"actor_id": "caregiver-1"});
        let (status, body) = send(&router, Method::POST, &uri, Some(outcome.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let done: TaskResponse = decode(body);
        assert_eq!(done.task.status, "completed");
        assert_eq!(done.task.completed_by.as_deref(), Some("caregiver-1"));

        let (status, _) = send(&router, Method::POST, &uri, Some(outcome)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_prn_dose_and_bad_timestamp() {
        let (_db, _state, router) = test_app::router().await;
        let recipient = recipient(&router).await;
        let (_, body) = send(
            &router,
            Method::POST,
            &format!("/api/households/{}/medications", recipient.household_id),
            Some(json!({
                "recipient_id": recipient.id,
                "name_enc": "enc:m",
                "dosage_enc": "enc:200mg",
                "is_prn": true,
            })),
        )
        .await;
        let medication: Medication = decode(body);
        let uri = format!("/api/households/{}/prn-doses", recipient.household_id);

        let (status, body) = send(
            &router,
            Method::POST,
            &uri,
            Some(json!({"medication_id": medication.id, "actor_id": "caregiver-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let dose: AdministrationResponse = decode(body);
        assert_eq!(dose.administration.status, "given");
        assert_eq!(dose.administration.schedule_id, None);
        assert_eq!(dose.administration.dosage_enc, "enc:200mg");

        let (status, _) = send(
            &router,
            Method::POST,
            &uri,
            Some(json!({
                "medication_id": medication.id,
                "actor_id": "caregiver-1",
                "administered_at": "yesterday",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
