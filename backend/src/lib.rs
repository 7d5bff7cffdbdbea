//! # CareHub Backend
//!
//! Turns recurring care templates (tasks, medication schedules and caregiver
//! shifts) into concrete, timestamped instances for each care recipient, and
//! keeps them in line as templates, timezones and the clock move.
//!
//! ## Architecture
//!
//! ```text
//! IO Layer (REST handlers, /health)        workers (generation, status, housekeeping)
//!     ↓                                        ↓
//! Domain Layer (services, generation engine, reconciliation)
//!     ↓
//! Storage Layer (SQLite repositories)
//! ```
//!
//! ## Key Responsibilities
//!
//! - Load configuration and open the database
//! - Wire every service into one cloneable [`AppState`]
//! - Build the axum router with CORS and request tracing

pub mod config;
pub mod domain;
pub mod error;
pub mod io;
pub mod storage;
pub mod workers;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::{
    BroadcastPublisher, CareLogService, EventPublisher, GenerationEngine, GenerationGate,
    MedicationService, RecipientService, ScheduleTrigger, ScheduleViewService, SettingsService,
    ShiftService, ShiftTemplateService, TaskTemplateService,
};
use crate::io::rest::{
    care_log_apis, health_apis, household_apis, medication_apis, schedule_apis, settings_apis,
    shift_apis, shift_template_apis, task_template_apis,
};
use crate::storage::{DbConnection, WorkerRunRepository};

/// Main application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub db: DbConnection,
    pub generation_gate: GenerationGate,
    pub events: Arc<BroadcastPublisher>,
    pub engine: GenerationEngine,
    pub recipient_service: RecipientService,
    pub task_template_service: TaskTemplateService,
    pub medication_service: MedicationService,
    pub shift_template_service: ShiftTemplateService,
    pub care_log_service: CareLogService,
    pub shift_service: ShiftService,
    pub schedule_view_service: ScheduleViewService,
    pub settings_service: SettingsService,
    pub worker_runs: WorkerRunRepository,
}

impl AppState {
    pub fn new(db: DbConnection) -> Self {
        let generation_gate = GenerationGate::new();
        let events = Arc::new(BroadcastPublisher::default());
        let publisher: Arc<dyn EventPublisher> = events.clone();
        let trigger = ScheduleTrigger::new(db.clone(), generation_gate.clone(), publisher);

        Self {
            engine: GenerationEngine::new(db.clone(), generation_gate.clone()),
            recipient_service: RecipientService::new(db.clone(), trigger.clone()),
            task_template_service: TaskTemplateService::new(db.clone(), trigger.clone()),
            medication_service: MedicationService::new(db.clone(), trigger.clone()),
            shift_template_service: ShiftTemplateService::new(db.clone(), trigger),
            care_log_service: CareLogService::new(db.clone()),
            shift_service: ShiftService::new(db.clone()),
            schedule_view_service: ScheduleViewService::new(db.clone()),
            settings_service: SettingsService::new(db.clone()),
            worker_runs: WorkerRunRepository::new(db.clone()),
            generation_gate,
            events,
            db,
        }
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    info!("setting up database");
    let db = DbConnection::init(config).await?;

    info!("setting up application state");
    Ok(AppState::new(db))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    match origin.parse::<HeaderValue>() {
        Ok(value) => cors.allow_origin(value),
        Err(e) => {
            warn!(origin, "ignoring invalid CORS origin: {}", e);
            cors
        }
    }
}

/// Create the axum router with all routes configured
pub fn create_router(app_state: AppState, cors_origin: &str) -> Router {
    let api_routes = Router::new()
        .merge(household_apis::router())
        .merge(task_template_apis::router())
        .merge(medication_apis::router())
        .merge(shift_template_apis::router())
        .merge(care_log_apis::router())
        .merge(shift_apis::router())
        .merge(schedule_apis::router())
        .merge(settings_apis::router());

    Router::new()
        .route("/health", get(health_apis::health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
        .with_state(app_state)
}
