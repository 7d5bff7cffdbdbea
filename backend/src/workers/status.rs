use anyhow::Context;
use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::supervisor::{run_periodic, BackoffPolicy, WorkerConfig};
use crate::domain::StatusChecker;
use crate::storage::WorkerRunRepository;

pub const WORKER_NAME: &str = "status";

pub fn spawn(
    checker: StatusChecker,
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
        let checker = checker.clone();
        async move {
            let report = checker.run(Utc::now()).await.context("status check failed")?;
            if report.failed_households > 0 {
                anyhow::bail!("status check failed for {} households", report.failed_households);
            }
            Ok::<(), anyhow::Error>(())
        }
    }))
}
