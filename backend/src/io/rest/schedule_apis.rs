//! # REST API for the Day Schedule
//!
//! One recipient's tasks, medication administrations and shifts for a single
//! local calendar day, ordered by time. `date` defaults to the recipient's
//! today.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use super::error_response;
use crate::domain::local_time::today_in;
use crate::error::{ScheduleError, ScheduleResult};
use crate::io::rest::mappers::schedule_mapper::ScheduleMapper;
use crate::AppState;
use shared::ScheduleQuery;

/// Create a router for schedule APIs
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/households/:household_id/recipients/:recipient_id/schedule",
        get(get_day_schedule),
    )
}

async fn requested_date(
    state: &AppState,
    household_id: &str,
    recipient_id: &str,
    date: Option<&str>,
    now: DateTime<Utc>,
) -> ScheduleResult<NaiveDate> {
    match date {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| ScheduleError::Validation(format!("date must be YYYY-MM-DD, got {}", value))),
        None => {
            let recipient = state
                .recipient_service
                .get_recipient(household_id, recipient_id)
                .await?;
            Ok(today_in(recipient.tz()?, now))
        }
    }
}

pub async fn get_day_schedule(
    State(state): State<AppState>,
    Path((household_id, recipient_id)): Path<(String, String)>,
    Query(query): Query<ScheduleQuery>,
) -> impl IntoResponse {
    info!(
        "GET /api/households/{}/recipients/{}/schedule - date: {:?}",
        household_id, recipient_id, query.date
    );

    let now = Utc::now();
    let date = match requested_date(&state, &household_id, &recipient_id, query.date.as_deref(), now).await {
        Ok(date) => date,
        Err(e) => return error_response("Invalid schedule request", e),
    };
    match state
        .schedule_view_service
        .day_schedule(&household_id, &recipient_id, date, now)
        .await
    {
        Ok(day) => (StatusCode::OK, Json(ScheduleMapper::to_response(day))).into_response(),
        Err(e) => error_response("Failed to load schedule", e),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::io::rest::test_support::{decode, send};
    use crate::test_app;
    use shared::{Household, Recipient, ScheduleResponse};

    #[tokio::test]
    async fn test_schedule_defaults_to_recipient_today_and_rejects_bad_dates() {
        let (_db, _state, router) = test_app::router().await;
        let (_, body) = send(&router, Method::POST, "/api/households", Some(json!({"name": "Home"}))).await;
        let household: Household = decode(body);
        let (_, body) = send(
            &router,
            Method::POST,
            &format!("/api/households/{}/recipients", household.id),
            Some(json!({"name_enc": "enc:r", "timezone": "Asia/Tokyo"})),
        )
        .await;
        let recipient: Recipient = decode(body);
        let base = format!("/api/households/{}/recipients/{}/schedule", household.id, recipient.id);

        let (status, body) = send(&router, Method::GET, &base, None).await;
        assert_eq!(status, StatusCode::OK);
        let today: ScheduleResponse = decode(body);
        assert_eq!(today.timezone, "Asia/Tokyo");
        assert!(today.items.is_empty());

        let (status, _) = send(&router, Method::GET, &format!("{}?date=03/01/2026", base), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
