//! Retires future pending instances when a template, a single medication
//! schedule or a whole medication is deactivated.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::domain::ports::{publish_best_effort, EventPublisher};
use crate::error::ScheduleResult;
use crate::storage::{DbConnection, InstanceRepository, SoftDeleteScope};

pub const CLEANED_EVENT: &str = "schedule.cleaned";

#[derive(Clone)]
pub struct CleanupService {
    db: DbConnection,
    publisher: Arc<dyn EventPublisher>,
}

impl CleanupService {
    pub fn new(db: DbConnection, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { db, publisher }
    }

    /// Soft-delete the future, pending, unannotated instances in `scope`.
    pub async fn retire(
        &self,
        household_id: &str,
        scope: SoftDeleteScope<'_>,
        now: DateTime<Utc>,
    ) -> ScheduleResult<u64> {
        let mut tx = self.db.pool().begin().await?;
        let removed = InstanceRepository::soft_delete_future_pending(&mut tx, scope, now).await?;
        tx.commit().await?;

        info!(household_id, ?scope, removed, "retired future instances");
        publish_best_effort(
            self.publisher.as_ref(),
            household_id,
            CLEANED_EVENT,
            json!({ "removed": removed }),
        )
        .await;
        Ok(removed)
    }
}
