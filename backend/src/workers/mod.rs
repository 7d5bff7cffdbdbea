//! # Background Workers
//!
//! Three timer-driven tasks run beside the HTTP server, each wrapped by
//! [`supervisor::run_periodic`]:
//!
//! - **generation**: materializes every recipient's rolling window
//! - **status**: overdue reporting, handoff prompts, missed and elapsed shifts
//! - **housekeeping**: prunes sessions, login attempts and settled notifications
//!
//! Intervals come from the process-wide engine settings at startup.

pub mod generation;
pub mod housekeeping;
pub mod status;
pub mod supervisor;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineSettings;
use crate::domain::{GenerationEngine, HousekeepingService, StatusChecker};
use crate::storage::WorkerRunRepository;

/// Handles of the running workers
pub struct Workers {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Workers {
    pub fn spawn(
        engine: GenerationEngine,
        checker: StatusChecker,
        housekeeping: HousekeepingService,
        runs: WorkerRunRepository,
        settings: &EngineSettings,
        cancel: &CancellationToken,
    ) -> Self {
        let handles = vec![
            (
                generation::WORKER_NAME,
                generation::spawn(engine, settings.scheduler_interval, runs.clone(), cancel.child_token()),
            ),
            (
                status::WORKER_NAME,
                status::spawn(checker, settings.status_interval, runs.clone(), cancel.child_token()),
            ),
            (
                housekeeping::WORKER_NAME,
                housekeeping::spawn(housekeeping, settings.housekeeping_interval, runs, cancel.child_token()),
            ),
        ];
        info!(count = handles.len(), "background workers started");
        Self { handles }
    }

    /// Wait for every worker to finish its current tick and exit.
    pub async fn join(self) {
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                warn!(worker = name, "worker ended abnormally: {}", e);
            }
        }
        info!("background workers stopped");
    }
}
