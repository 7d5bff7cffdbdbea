//! Restart wrapper shared by the periodic workers.
//!
//! Each tick runs on its own task so a panic is contained and reported as a
//! `JoinError`. Handled errors wait the normal interval; panics wait an
//! exponentially growing, capped delay. Cancellation is only checked between
//! ticks, so a tick in progress is never cut short.

use anyhow::Result;
use chrono::Utc;
use std::any::Any;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::storage::WorkerRunRepository;

/// Delay before the next tick after consecutive crashes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(10 * 60),
            factor: 2,
        }
    }
}

impl BackoffPolicy {
    /// `initial * factor^(crashes - 1)`, capped at `max`. Zero crashes means no delay.
    pub fn delay(&self, crashes: u32) -> Duration {
        if crashes == 0 {
            return Duration::ZERO;
        }
        let mut delay = self.initial;
        for _ in 1..crashes {
            delay = delay.saturating_mul(self.factor);
            if delay >= self.max {
                return self.max;
            }
        }
        delay.min(self.max)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub name: &'static str,
    pub interval: Duration,
    pub backoff: BackoffPolicy,
    /// Run the first tick right away instead of after one interval.
    pub run_immediately: bool,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `tick` every `config.interval` until `cancel` fires.
pub async fn run_periodic<F, Fut>(
    config: WorkerConfig,
    cancel: CancellationToken,
    runs: WorkerRunRepository,
    mut tick: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let worker = config.name;
    let mut delay = if config.run_immediately {
        Duration::ZERO
    } else {
        config.interval
    };
    let mut crashes = 0u32;
    info!(worker, interval_secs = config.interval.as_secs(), "worker started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(worker, "worker stopped");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if let Err(e) = runs.record_start(worker, Utc::now()).await {
            warn!(worker, "failed to record worker start: {}", e);
        }

        match tokio::spawn(tick()).await {
            Ok(Ok(())) => {
                crashes = 0;
                delay = config.interval;
                debug!(worker, "tick finished");
                if let Err(e) = runs.record_success(worker, Utc::now()).await {
                    warn!(worker, "failed to record worker success: {}", e);
                }
            }
            Ok(Err(e)) => {
                crashes = 0;
                delay = config.interval;
                error!(worker, "tick failed: {:#}", e);
                if let Err(e) = runs.record_failure(worker, &format!("{:#}", e), Utc::now()).await {
                    warn!(worker, "failed to record worker failure: {}", e);
                }
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    format!("tick panicked: {}", panic_message(join_error.into_panic().as_ref()))
                } else {
                    "tick was cancelled".to_string()
                };
                crashes = crashes.saturating_add(1);
                delay = config.backoff.delay(crashes);
                error!(worker, crashes, retry_in_ms = delay.as_millis() as u64, "{}", message);
                if let Err(e) = runs.record_failure(worker, &message, Utc::now()).await {
                    warn!(worker, "failed to record worker failure: {}", e);
                }
            }
        }
    }
}
