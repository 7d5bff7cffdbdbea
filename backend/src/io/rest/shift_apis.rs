//! # REST API for Shifts
//!
//! Clock in and out, swaps between caregivers, and handoff notes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tracing::info;

use super::error_response;
use crate::domain::commands::shifts::HandoffCommand;
use crate::domain::models::Shift;
use crate::io::rest::mappers::shift_mapper::ShiftMapper;
use crate::AppState;
use shared::{HandoffListResponse, HandoffRequest, ShiftResponse, SwapShiftRequest};

/// Create a router for shift APIs
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/households/:household_id/shifts/:shift_id", get(get_shift))
        .route("/households/:household_id/shifts/:shift_id/clock-in", post(clock_in))
        .route("/households/:household_id/shifts/:shift_id/clock-out", post(clock_out))
        .route("/households/:household_id/shifts/:shift_id/swap", post(swap_shift))
        .route(
            "/households/:household_id/shifts/:shift_id/handoffs",
            get(list_handoffs).post(record_handoff),
        )
}

fn shift_response(shift: Shift, message: &str) -> ShiftResponse {
    ShiftResponse {
        shift: ShiftMapper::to_shift_dto(shift),
        success_message: message.to_string(),
    }
}

pub async fn get_shift(
    State(state): State<AppState>,
    Path((household_id, shift_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/households/{}/shifts/{}", household_id, shift_id);

    match state.shift_service.get_shift(&household_id, &shift_id).await {
        Ok(shift) => (StatusCode::OK, Json(ShiftMapper::to_shift_dto(shift))).into_response(),
        Err(e) => error_response("Failed to get shift", e),
    }
}

pub async fn clock_in(
    State(state): State<AppState>,
    Path((household_id, shift_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/shifts/{}/clock-in", household_id, shift_id);

    match state.shift_service.clock_in(&household_id, &shift_id, Utc::now()).await {
        Ok(shift) => (StatusCode::OK, Json(shift_response(shift, "Clocked in"))).into_response(),
        Err(e) => error_response("Failed to clock in", e),
    }
}

pub async fn clock_out(
    State(state): State<AppState>,
    Path((household_id, shift_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/shifts/{}/clock-out", household_id, shift_id);

    match state.shift_service.clock_out(&household_id, &shift_id, Utc::now()).await {
        Ok(shift) => (StatusCode::OK, Json(shift_response(shift, "Clocked out"))).into_response(),
        Err(e) => error_response("Failed to clock out", e),
    }
}

/// Accept a swap: the shift moves to another caregiver as a one-off replacement
pub async fn swap_shift(
    State(state): State<AppState>,
    Path((household_id, shift_id)): Path<(String, String)>,
    Json(request): Json<SwapShiftRequest>,
) -> impl IntoResponse {
    info!(
        "POST /api/households/{}/shifts/{}/swap - request: {:?}",
        household_id, shift_id, request
    );

    match state
        .shift_service
        .accept_swap(&household_id, &shift_id, &request.caregiver_id, Utc::now())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(ShiftMapper::to_swap_response(result))).into_response(),
        Err(e) => error_response("Failed to swap shift", e),
    }
}

pub async fn record_handoff(
    State(state): State<AppState>,
    Path((household_id, shift_id)): Path<(String, String)>,
    Json(request): Json<HandoffRequest>,
) -> impl IntoResponse {
    info!("POST /api/households/{}/shifts/{}/handoffs - author: {}", household_id, shift_id, request.author_id);

    let command = HandoffCommand {
        author_id: request.author_id,
        notes_enc: request.notes_enc,
    };
    match state
        .shift_service
        .record_handoff(&household_id, &shift_id, command, Utc::now())
        .await
    {
        Ok(handoff) => (StatusCode::CREATED, Json(ShiftMapper::to_handoff_dto(handoff))).into_response(),
        Err(e) => error_response("Failed to record handoff", e),
    }
}

pub async fn list_handoffs(
    State(state): State<AppState>,
    Path((household_id, shift_id)): Path<(String, String)>,
) -> impl IntoResponse {
    info!("GET /api/households/{}/shifts/{}/handoffs", household_id, shift_id);

    match state.shift_service.list_handoffs(&household_id, &shift_id).await {
        Ok(handoffs) => {
            let response = HandoffListResponse {
                handoffs: handoffs.into_iter().map(ShiftMapper::to_handoff_dto).collect(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response("Failed to list handoffs", e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::io::rest::test_support::{decode, send};
    use crate::test_app;
    use shared::{
        HandoffListResponse, Household, Recipient, ScheduleItemKind, ScheduleResponse,
        ShiftResponse, SwapShiftResponse,
    };

    /// Two shifts tomorrow for one recipient, returned as (household, shift ids).
    async fn tomorrows_shifts(router: &axum::Router) -> (String, Vec<String>) {
        let (_, body) = send(router, Method::POST, "/api/households", Some(json!({"name": "Home"}))).await;
        let household: Household = decode(body);
        let (_, body) = send(
            router,
            Method::POST,
            &format!("/api/households/{}/recipients", household.id),
            Some(json!({"name_enc": "enc:r", "timezone": "UTC"})),
        )
        .await;
        let recipient: Recipient = decode(body);
        let (status, _) = send(
            router,
            Method::POST,
            &format!("/api/households/{}/shift-templates", household.id),
            Some(json!({
                "recipient_id": recipient.id,
                "caregiver_id": "caregiver-a",
                "duration_minutes": 240,
                "recurrence": {"frequency": "daily", "times_of_day": ["08:00", "16:00"]},
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let tomorrow = (Utc::now() + Duration::days(1)).format("%Y-%m-%d");
        let uri = format!(
            "/api/households/{}/recipients/{}/schedule?date={}",
            household.id, recipient.id, tomorrow
        );
        let (status, body) = send(router, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let schedule: ScheduleResponse = decode(body);
        let shifts = schedule
            .items
            .into_iter()
            .filter(|item| item.kind == ScheduleItemKind::Shift)
            .map(|item| item.id)
            .collect::<Vec<_>>();
        assert_eq!(shifts.len(), 2);
        (household.id, shifts)
    }

    #[tokio::test]
    async fn test_clock_in_handoff_and_clock_out() {
        let (_db, _state, router) = test_app::router().await;
        let (household_id, shifts) = tomorrows_shifts(&router).await;
        let base = format!("/api/households/{}/shifts/{}", household_id, shifts[0]);

        let (status, _) = send(
            &router,
            Method::POST,
            &format!("{}/handoffs", base),
            Some(json!({"author_id": "caregiver-a", "notes_enc": "enc:notes"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&router, Method::POST, &format!("{}/clock-in", base), None).await;
        assert_eq!(status, StatusCode::OK);
        let active: ShiftResponse = decode(body);
        assert_eq!(active.shift.status, "active");
        assert!(active.shift.clock_in_at.is_some());

        let (status, _) = send(&router, Method::POST, &format!("{}/clock-in", base), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &router,
            Method::POST,
            &format!("{}/handoffs", base),
            Some(json!({"author_id": "caregiver-a", "notes_enc": "enc:notes"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, body) = send(&router, Method::GET, &format!("{}/handoffs", base), None).await;
        assert_eq!(decode::<HandoffListResponse>(body).handoffs.len(), 1);

        let (status, body) = send(&router, Method::POST, &format!("{}/clock-out", base), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decode::<ShiftResponse>(body).shift.status, "completed");
    }

    #[tokio::test]
    async fn test_swap_creates_replacement() {
        let (_db, _state, router) = test_app::router().await;
        let (household_id, shifts) = tomorrows_shifts(&router).await;
        let uri = format!("/api/households/{}/shifts/{}/swap", household_id, shifts[1]);

        let (status, _) = send(&router, Method::POST, &uri, Some(json!({"caregiver_id": "caregiver-a"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&router, Method::POST, &uri, Some(json!({"caregiver_id": "caregiver-b"}))).await;
        assert_eq!(status, StatusCode::OK);
        let swap: SwapShiftResponse = decode(body);
        assert_eq!(swap.original.status, "swapped");
        assert_eq!(swap.replacement.status, "scheduled");
        assert_eq!(swap.replacement.caregiver_id, "caregiver-b");
        assert_eq!(swap.replacement.template_id, None);
        assert_eq!(swap.replacement.starts_at, swap.original.starts_at);

        let (status, _) = send(&router, Method::POST, &uri, Some(json!({"caregiver_id": "caregiver-c"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
