//! # Health Probe
//!
//! `GET /health` reports the generation gate and the last run of every
//! background worker. The probe answers 200 while the database is reachable;
//! a worker whose latest tick failed turns the status to "degraded".

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::{debug, error};

use crate::io::rest::mappers::opt_timestamp;
use crate::storage::WorkerRun;
use crate::AppState;
use shared::{ErrorResponse, HealthResponse, WorkerHealth};

fn to_worker_health(run: WorkerRun) -> WorkerHealth {
    WorkerHealth {
        last_started_at: opt_timestamp(&run.last_started_at),
        last_success_at: opt_timestamp(&run.last_success_at),
        last_error_at: opt_timestamp(&run.last_error_at),
        worker: run.worker,
        last_error: run.last_error,
        consecutive_failures: run.consecutive_failures,
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    debug!("GET /health");

    match state.worker_runs.list().await {
        Ok(runs) => {
            let workers: Vec<WorkerHealth> = runs.into_iter().map(to_worker_health).collect();
            let degraded = workers.iter().any(|w| w.consecutive_failures > 0);
            let response = HealthResponse {
                status: if degraded { "degraded" } else { "ok" }.to_string(),
                generation_suspended: state.generation_gate.is_suspended(),
                workers,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "database unavailable".to_string(),
                }),
            )
                .into_response()
        }
    }
}
