//! # REST API Interface Layer
//!
//! HTTP endpoints for households, templates, care logging, shifts, the day
//! schedule and runtime settings.
//!
//! ## Error Translation
//!
//! | Domain error                                        | Status |
//! |-----------------------------------------------------|--------|
//! | `Validation`, `InvalidTimezone`, `InvalidTimeOfDay` | 400    |
//! | `NotFound`                                          | 404    |
//! | `InvalidTransition`                                 | 409    |
//! | anything else                                       | 500    |
//!
//! Server errors never echo their cause to the client; the cause is logged.

pub mod care_log_apis;
pub mod health_apis;
pub mod household_apis;
pub mod mappers;
pub mod medication_apis;
pub mod schedule_apis;
pub mod settings_apis;
pub mod shift_apis;
pub mod shift_template_apis;
pub mod task_template_apis;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use shared::ErrorResponse;
use tracing::{error, warn};

use crate::error::ScheduleError;

pub(crate) fn status_for(error: &ScheduleError) -> StatusCode {
    match error {
        ScheduleError::Validation(_)
        | ScheduleError::InvalidTimezone(_)
        | ScheduleError::InvalidTimeOfDay(_) => StatusCode::BAD_REQUEST,
        ScheduleError::NotFound { .. } => StatusCode::NOT_FOUND,
        ScheduleError::InvalidTransition { .. } => StatusCode::CONFLICT,
        ScheduleError::ScheduleUpdate(_)
        | ScheduleError::Storage(_)
        | ScheduleError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Translate a domain error into an HTTP response.
pub(crate) fn error_response(context: &str, error: ScheduleError) -> Response {
    let status = status_for(&error);
    let message = if status.is_server_error() {
        error!("{}: {:?}", context, error);
        match error {
            ScheduleError::ScheduleUpdate(_) => error.to_string(),
            _ => "internal server error".to_string(),
        }
    } else {
        warn!("{}: {}", context, error);
        error.to_string()
    };
    (status, Json(ErrorResponse { error: message })).into_response()
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use serde::de::DeserializeOwned;
    use serde_json::Value;
    use tower::ServiceExt;

    pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub fn decode<T: DeserializeOwned>(value: Value) -> T {
        serde_json::from_value(value).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ScheduleError::InvalidTimezone("Mars/Base".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&ScheduleError::not_found("task", "t1")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&ScheduleError::InvalidTransition {
                entity: "shift",
                from: "completed".into(),
                to: "active".into(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ScheduleError::schedule_update(ScheduleError::Validation("x".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
