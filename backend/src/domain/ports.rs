//! Capabilities the scheduling domain calls out to: notification delivery,
//! live-client event fan-out and the generation suspend signal.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::domain::models::Notification;

/// Fire-and-forget delivery of a notification. Callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Default notifier: writes the notification to the log.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            household_id = %notification.household_id,
            kind = notification.kind.as_str(),
            ref_id = %notification.ref_id,
            "notification: {}",
            notification.title
        );
        Ok(())
    }
}

/// An event pushed to connected clients of one household.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEvent {
    pub household_id: String,
    pub event_type: String,
    pub payload: Value,
}

/// Best-effort broadcast to live clients; never required for correctness.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, household_id: &str, event_type: &str, payload: Value) -> Result<()>;
}

/// Publisher backed by a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<ScheduleEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, household_id: &str, event_type: &str, payload: Value) -> Result<()> {
        let event = ScheduleEvent {
            household_id: household_id.to_string(),
            event_type: event_type.to_string(),
            payload,
        };
        // No subscribers is not a failure.
        if self.sender.send(event).is_err() {
            debug!(household_id, event_type, "no live subscribers for event");
        }
        Ok(())
    }
}

/// Publish and swallow failures, logging them.
pub async fn publish_best_effort(
    publisher: &dyn EventPublisher,
    household_id: &str,
    event_type: &str,
    payload: Value,
) {
    if let Err(e) = publisher.publish(household_id, event_type, payload).await {
        warn!(household_id, event_type, "failed to publish event: {:#}", e);
    }
}

/// Send and swallow failures, logging them.
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(e) = notifier.send(notification).await {
        warn!(
            household_id = %notification.household_id,
            kind = notification.kind.as_str(),
            "failed to send notification: {:#}",
            e
        );
    }
}

/// Suspend/resume signal for generation, held while stored ciphertext is
/// being re-encrypted.
///
/// Suspensions nest: generation resumes when the last guard is dropped.
#[derive(Debug, Clone)]
pub struct GenerationGate {
    holds: Arc<watch::Sender<usize>>,
}

impl GenerationGate {
    pub fn new() -> Self {
        let (holds, _) = watch::channel(0);
        Self {
            holds: Arc::new(holds),
        }
    }

    /// Suspend generation until the returned guard is dropped.
    pub fn suspend(&self) -> GenerationSuspended {
        self.holds.send_modify(|n| *n += 1);
        info!("generation suspended");
        GenerationSuspended {
            holds: Arc::clone(&self.holds),
        }
    }

    pub fn is_suspended(&self) -> bool {
        *self.holds.borrow() > 0
    }

    /// Watch the number of outstanding suspensions.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.holds.subscribe()
    }
}

impl Default for GenerationGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard returned by [`GenerationGate::suspend`].
#[must_use = "generation resumes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct GenerationSuspended {
    holds: Arc<watch::Sender<usize>>,
}

impl Drop for GenerationSuspended {
    fn drop(&mut self) {
        self.holds.send_modify(|n| *n = n.saturating_sub(1));
        if *self.holds.borrow() == 0 {
            info!("generation resumed");
        }
    }
}
