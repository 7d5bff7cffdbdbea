//! # REST API for Task Templates
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
use shared::{CreateTaskTemplateRequest, SetActiveRequest, UpdateTaskTemplateRequest};

/// Create a router for task template APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/households/:household_id/task-templates", post(create_task_template))
        .route(
            "/households/:household_id/task-templates/:template_id",
            get(get_task_template).put(update_task_template),
        )
        .route(
            "/households/:household_id/task-templates/:template_id/active",
            put(set_task_template_active),
        )
}

pub async fn create_task_template(
    State(state): State<AppState>,
    Path(household_id): Path<String>,
    Json(request): Json<CreateTaskTemplateRequest>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/task-templates - request: {:?}", household_id, request);

    let command = TemplateMapper::to_create_task_command(request);
    match state
        .task_template_service
        .create_template(&household_id, command, Utc::now())
        .await
    {
        Ok(result) => (
            StatusCode::CREATED,
            Json(TemplateMapper::to_task_template_response(result)),
        )
            .into_response(),
        Err(e) => error_response("Failed to create task template", e),
    }
}

pub async fn get_task_template(
    State(state): State<AppState>,
    Path((household_id, template_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/households/{}/task-templates/{}", household_id, template_id);

    match state
        .task_template_service
        .get_template(&household_id, &template_id)
        .await
    {
        Ok(template) => (StatusCode::OK, Json(TemplateMapper::to_task_template_dto(template))).into_response(),
        Err(e) => error_response("Failed to get task template", e),
    }
}

pub async fn update_task_template(
    State(state): State<AppState>,
    Path((household_id, template_id)): Path<(String, String)>,
    Json(request): Json<UpdateTaskTemplateRequest>,
) -> impl IntoResponse {
    info!(
        "PUT /api/households/{}/task-templates/{} - request: {:?}",
        household_id, template_id, request
    );

    let command = TemplateMapper::to_update_task_command(request);
    match state
        .task_template_service
        .update_template(&household_id, &template_id, command, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(TemplateMapper::to_task_template_response(result))).into_response(),
        Err(e) => error_response("Failed to update task template", e),
    }
}

pub async fn set_task_template_active(
    State(state): State<AppState>,
    Path((household_id, template_id)): Path<(String, String)>,
    Json(request): Json<SetActiveRequest>,
) -> impl IntoResponse {
    info!(
        "PUT /api/households/{}/task-templates/{}/active - is_active: {}",
        household_id, template_id, request.is_active
    );

    match state
        .task_template_service
        .set_active(&household_id, &template_id, request.is_active, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(TemplateMapper::to_task_template_response(result))).into_response(),
        Err(e) => error_response("Failed to change task template state", e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::io::rest::test_support::{decode, send};
    use crate::test_app;
    use shared::{Household, Recipient, TaskTemplateResponse};

    async fn recipient(router: &axum::Router) -> Recipient {
        let (_, body) = send(router, Method::POST, "/api/households", Some(json!({"name": "Home"}))).await;
        let household: Household = decode(body);
        let uri = format!("/api/households/{}/recipients", household.id);
        let (_, body) = send(
            router,
            Method::POST,
            &uri,
            Some(json!({"name_enc": "enc:r", "timezone": "UTC"})),
        )
        .await;
        decode(body)
    }

    fn template_body(recipient_id: &str, times: Value) -> Value {
        json!({
            "recipient_id": recipient_id,
            "title_enc": "enc:water plants",
            "recurrence": {"frequency": "daily", "times_of_day": times}
        })
    }

    #[tokio::test]
    async fn test_create_generates_and_deactivate_retires() {
        let (_db, _state, router) = test_app::router().await;
        let recipient = recipient(&router).await;
        let base = format!("/api/households/{}/task-templates", recipient.household_id);

        let (status, body) = send(
            &router,
            Method::POST,
            &base,
            Some(template_body(&recipient.id, json!(["08:00", "20:00"]))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: TaskTemplateResponse = decode(body);
        assert!(created.generated > 0);
        assert_eq!(created.template.category, "general");
        assert_eq!(created.template.recurrence.times_of_day, vec!["08:00", "20:00"]);

        let uri = format!("{}/{}/active", base, created.template.id);
        let (status, body) = send(&router, Method::PUT, &uri, Some(json!({"is_active": false}))).await;
        assert_eq!(status, StatusCode::OK);
        let retired: TaskTemplateResponse = decode(body);
        assert!(!retired.template.is_active);
        assert!(retired.removed > 0 && retired.removed <= created.generated);
    }

    #[tokio::test]
    async fn test_bad_time_of_day_is_rejected() {
        let (_db, _state, router) = test_app::router().await;
        let recipient = recipient(&router).await;
        let base = format!("/api/households/{}/task-templates", recipient.household_id);

        let (status, _) = send(
            &router,
            Method::POST,
            &base,
            Some(template_body(&recipient.id, json!(["24:30"]))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&router, Method::GET, &format!("{}/missing", base), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
