//! On-demand generation after user mutations.
//!
//! Every method runs after the mutation itself has committed. Failures are
//! logged with context and surfaced as [`ScheduleError::ScheduleUpdate`]; the
//! next scheduler tick repairs whatever was left undone.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::error;

use crate::domain::cleanup::CleanupService;
use crate::domain::generation::{GenerationEngine, TemplateSelector};
use crate::domain::models::CareRecipient;
use crate::domain::ports::{EventPublisher, GenerationGate};
use crate::domain::reconciliation::{ReconcileOutcome, Reconciler};
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{DbConnection, SoftDeleteScope};

#[derive(Clone)]
pub struct ScheduleTrigger {
    engine: GenerationEngine,
    reconciler: Reconciler,
    cleanup: CleanupService,
}

impl ScheduleTrigger {
    pub fn new(db: DbConnection, gate: GenerationGate, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            engine: GenerationEngine::new(db.clone(), gate.clone()),
            reconciler: Reconciler::new(db.clone(), gate, Arc::clone(&publisher)),
            cleanup: CleanupService::new(db, publisher),
        }
    }

    /// A template was created or reactivated: fill its window.
    pub async fn generate(
        &self,
        recipient: &CareRecipient,
        selector: TemplateSelector<'_>,
        now: DateTime<Utc>,
    ) -> ScheduleResult<u64> {
        self.engine
            .generate_recipient(recipient, selector, now)
            .await
            .map_err(|e| {
                error!(
                    household_id = %recipient.household_id,
                    recipient_id = %recipient.id,
                    ?selector,
                    "on-demand generation failed: {}",
                    e
                );
                ScheduleError::schedule_update(e)
            })
    }

    /// Timing or timezone changed: retire stale instances and regenerate.
    pub async fn reconcile(
        &self,
        recipient: &CareRecipient,
        scope: SoftDeleteScope<'_>,
        selector: TemplateSelector<'_>,
        now: DateTime<Utc>,
    ) -> ScheduleResult<ReconcileOutcome> {
        self.reconciler
            .reconcile(recipient, scope, selector, now)
            .await
            .map_err(|e| {
                error!(
                    household_id = %recipient.household_id,
                    recipient_id = %recipient.id,
                    ?scope,
                    "reconciliation failed: {}",
                    e
                );
                ScheduleError::schedule_update(e)
            })
    }

    /// A template, schedule or medication was deactivated.
    pub async fn retire(
        &self,
        household_id: &str,
        scope: SoftDeleteScope<'_>,
        now: DateTime<Utc>,
    ) -> ScheduleResult<u64> {
        self.cleanup
            .retire(household_id, scope, now)
            .await
            .map_err(|e| {
                error!(household_id, ?scope, "cleanup failed: {}", e);
                ScheduleError::schedule_update(e)
            })
    }
}
