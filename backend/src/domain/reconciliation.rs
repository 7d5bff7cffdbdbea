//! Soft-delete-then-regenerate, run when a template's timing or a
//! recipient's timezone changes.
//!
//! Only future, pending, unannotated instances are removed. Anything a
//! caregiver has acted on or written notes against survives untouched, even if
//! it no longer matches the rule.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::domain::generation::{GenerationEngine, TemplateSelector};
use crate::domain::models::CareRecipient;
use crate::domain::ports::{publish_best_effort, EventPublisher, GenerationGate};
use crate::domain::settings_service::SettingsService;
use crate::error::ScheduleResult;
use crate::storage::{DbConnection, InstanceRepository, SoftDeleteScope};

pub const RECONCILED_EVENT: &str = "schedule.reconciled";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub removed: u64,
    pub created: u64,
}

#[derive(Clone)]
pub struct Reconciler {
    db: DbConnection,
    settings_service: SettingsService,
    gate: GenerationGate,
    publisher: Arc<dyn EventPublisher>,
}

impl Reconciler {
    pub fn new(db: DbConnection, gate: GenerationGate, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            settings_service: SettingsService::new(db.clone()),
            db,
            gate,
            publisher,
        }
    }

    /// Retire stale instances in `scope` and regenerate `selector` over the
    /// window, in one transaction.
    ///
    /// While generation is suspended the retirement still happens and the
    /// next scheduler tick fills the window back in.
    pub async fn reconcile(
        &self,
        recipient: &CareRecipient,
        scope: SoftDeleteScope<'_>,
        selector: TemplateSelector<'_>,
        now: DateTime<Utc>,
    ) -> ScheduleResult<ReconcileOutcome> {
        let settings = self
            .settings_service
            .household_settings(&recipient.household_id)
            .await?;
        recipient.tz()?;

        let mut tx = self.db.pool().begin().await?;
        let removed = InstanceRepository::soft_delete_future_pending(&mut tx, scope, now).await?;
        let created = if self.gate.is_suspended() {
            0
        } else {
            GenerationEngine::generate_in(&mut tx, recipient, selector, &settings, now).await?
        };
        tx.commit().await?;

        info!(
            household_id = %recipient.household_id,
            recipient_id = %recipient.id,
            removed,
            created,
            "reconciled schedule"
        );

        publish_best_effort(
            self.publisher.as_ref(),
            &recipient.household_id,
            RECONCILED_EVENT,
            json!({
                "recipient_id": recipient.id,
                "removed": removed,
                "created": created,
            }),
        )
        .await;

        Ok(ReconcileOutcome { removed, created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskStatus;
    use crate::domain::ports::BroadcastPublisher;
    use crate::domain::test_utils::*;
    use crate::storage::TaskTemplateRepository;

    #[tokio::test]
    async fn test_reconcile_preserves_completed_and_annotated() {
        let db = DbConnection::init_test().await.unwrap();
        let gate = GenerationGate::new();
        let publisher = Arc::new(BroadcastPublisher::new(8));
        let mut events = publisher.subscribe();
        let engine = GenerationEngine::new(db.db.clone(), gate.clone());
        let reconciler = Reconciler::new(db.db.clone(), gate, publisher);
        let instances = InstanceRepository::new(db.db.clone());

        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let mut template = create_task_template(&db, &recipient, daily(&["08:00"])).await;
        let now = utc("2026-03-01T06:00:00Z");
        engine
            .generate_recipient(&recipient, TemplateSelector::All, now)
            .await
            .unwrap();

        let tasks = instances
            .list_tasks_between(&recipient.id, now, utc("2026-03-04T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(tasks.len(), 3);

        let mut completed = tasks[0].clone();
        completed.status = TaskStatus::Completed;
        completed.completed_at = Some(now);
        assert!(instances.update_task(&completed, TaskStatus::Pending).await.unwrap());

        let mut annotated = tasks[1].clone();
        annotated.notes_enc = Some("enc:note".to_string());
        assert!(instances.update_task(&annotated, TaskStatus::Pending).await.unwrap());

        template.rule = daily(&["10:00"]);
        let mut conn = db.pool().acquire().await.unwrap();
        TaskTemplateRepository::update_template(&mut conn, &template)
            .await
            .unwrap();
        drop(conn);

        let outcome = reconciler
            .reconcile(
                &recipient,
                SoftDeleteScope::TaskTemplate(&template.id),
                TemplateSelector::TaskTemplate(&template.id),
                now,
            )
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome { removed: 1, created: 3 });

        let live = instances
            .list_tasks_between(&recipient.id, now, utc("2026-03-04T00:00:00Z"))
            .await
            .unwrap();
        let ids: Vec<&str> = live.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(live.len(), 5);
        assert!(ids.contains(&completed.id.as_str()));
        assert!(ids.contains(&annotated.id.as_str()));
        assert!(!ids.contains(&tasks[2].id.as_str()));

        let event = events.recv().await.unwrap();
        assert_eq!(event.event_type, RECONCILED_EVENT);
        assert_eq!(event.payload["removed"], 1);
    }

    #[tokio::test]
    async fn test_reconcile_leaves_past_pending_instances() {
        let db = DbConnection::init_test().await.unwrap();
        let gate = GenerationGate::new();
        let engine = GenerationEngine::new(db.db.clone(), gate.clone());
        let reconciler = Reconciler::new(db.db.clone(), gate, Arc::new(BroadcastPublisher::default()));
        let instances = InstanceRepository::new(db.db.clone());

        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let template = create_task_template(&db, &recipient, daily(&["08:00"])).await;
        engine
            .generate_recipient(&recipient, TemplateSelector::All, utc("2026-03-01T06:00:00Z"))
            .await
            .unwrap();

        // The 08:00 occurrence today has already passed.
        let later = utc("2026-03-01T09:00:00Z");
        let outcome = reconciler
            .reconcile(
                &recipient,
                SoftDeleteScope::TaskTemplate(&template.id),
                TemplateSelector::TaskTemplate(&template.id),
                later,
            )
            .await
            .unwrap();

        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.created, 2);
        let today = instances
            .list_tasks_between(
                &recipient.id,
                utc("2026-03-01T00:00:00Z"),
                utc("2026-03-02T00:00:00Z"),
            )
            .await
            .unwrap();
        assert_eq!(today.len(), 1);
    }
}
