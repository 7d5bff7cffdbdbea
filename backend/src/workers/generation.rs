use anyhow::{bail, Context};
use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::supervisor::{run_periodic, BackoffPolicy, WorkerConfig};
use crate::domain::GenerationEngine;
use crate::storage::WorkerRunRepository;

pub const WORKER_NAME: &str = "generation";

/// Keep every recipient's rolling window materialized.
///
/// The first tick waits one interval; `main` already ran a full pass before
/// binding the listener.
pub fn spawn(
    engine: GenerationEngine,
    interval: Duration,
    runs: WorkerRunRepository,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let config = WorkerConfig {
        name: WORKER_NAME,
        interval,
        backoff: BackoffPolicy::default(),
        run_immediately: false,
    };
    tokio::spawn(run_periodic(config, cancel, runs, move || {
        let engine = engine.clone();
        async move {
            let report = engine
                .generate_all(Utc::now())
                .await
                .context("generation run failed")?;
            if report.suspended {
                info!("generation suspended for this tick");
            }
            if !report.failures.is_empty() {
                bail!(
                    "generation failed for {} of {} recipients",
                    report.failures.len(),
                    report.recipients
                );
            }
            Ok::<(), anyhow::Error>(())
        }
    }))
}
