use anyhow::Context;
use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::supervisor::{run_periodic, BackoffPolicy, WorkerConfig};
use crate::domain::HousekeepingService;
use crate::storage::WorkerRunRepository;

pub const WORKER_NAME: &str = "housekeeping";

pub fn spawn(
    service: HousekeepingService,
    interval: Duration,
    runs: WorkerRunRepository,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let config = WorkerConfig {
        name: WORKER_NAME,
        interval,
        backoff: BackoffPolicy::default(),
        run_immediately: true,
    };
    tokio::spawn(run_periodic(config, cancel, runs, move || {
        let service = service.clone();
        async move {
            service.run(Utc::now()).await.context("housekeeping failed")?;
            Ok::<(), anyhow::Error>(())
        }
    }))
}
