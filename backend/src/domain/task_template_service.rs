use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::commands::task_templates::{
    CreateTaskTemplateCommand, UpdateTaskTemplateCommand,
};
use crate::domain::commands::TemplateMutation;
use crate::domain::generation::TemplateSelector;
use crate::domain::models::{generate_id, CareRecipient, TaskTemplate};
use crate::domain::trigger::ScheduleTrigger;
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{DbConnection, HouseholdRepository, SoftDeleteScope, TaskTemplateRepository};

/// Service for recurring task definitions
#[derive(Clone)]
pub struct TaskTemplateService {
    db: DbConnection,
    template_repository: TaskTemplateRepository,
    household_repository: HouseholdRepository,
    trigger: ScheduleTrigger,
}

impl TaskTemplateService {
    pub fn new(db: DbConnection, trigger: ScheduleTrigger) -> Self {
        Self {
            template_repository: TaskTemplateRepository::new(db.clone()),
            household_repository: HouseholdRepository::new(db.clone()),
            db,
            trigger,
        }
    }

    async fn recipient(&self, household_id: &str, recipient_id: &str) -> ScheduleResult<CareRecipient> {
        self.household_repository
            .get_recipient(household_id, recipient_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("recipient", recipient_id))
    }

    pub async fn get_template(
        &self,
        household_id: &str,
        template_id: &str,
    ) -> ScheduleResult<TaskTemplate> {
        self.template_repository
            .get_template(household_id, template_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("task template", template_id))
    }

    /// Create a template and materialize its current window
    pub async fn create_template(
        &self,
        household_id: &str,
        command: CreateTaskTemplateCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<TaskTemplate>> {
        let rule = command.recurrence.to_rule()?;
        if command.title_enc.is_empty() {
            return Err(ScheduleError::Validation("task title cannot be empty".to_string()));
        }
        let recipient = self.recipient(household_id, &command.recipient_id).await?;

        let template = TaskTemplate {
            id: generate_id(),
            household_id: household_id.to_string(),
            recipient_id: recipient.id.clone(),
            title_enc: command.title_enc,
            description_enc: command.description_enc,
            category: command.category.unwrap_or_else(|| "general".to_string()),
            assigned_to: command.assigned_to,
            rule,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.template_repository.store_template(&template).await?;
        info!(household_id, template_id = %template.id, "created task template");

        let generated = self
            .trigger
            .generate(&recipient, TemplateSelector::TaskTemplate(&template.id), now)
            .await?;

        Ok(TemplateMutation {
            template,
            generated,
            removed: 0,
            success_message: "Task template created".to_string(),
        })
    }

    /// Edit a template. Content-only edits apply to instances generated from
    /// now on; timing edits reconcile the window.
    pub async fn update_template(
        &self,
        household_id: &str,
        template_id: &str,
        command: UpdateTaskTemplateCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<TaskTemplate>> {
        let new_rule = command.recurrence.as_ref().map(|r| r.to_rule()).transpose()?;
        let mut template = self.get_template(household_id, template_id).await?;

        if let Some(title_enc) = command.title_enc {
            if title_enc.is_empty() {
                return Err(ScheduleError::Validation("task title cannot be empty".to_string()));
            }
            template.title_enc = title_enc;
        }
        if let Some(description_enc) = command.description_enc {
            template.description_enc = Some(description_enc);
        }
        if let Some(category) = command.category {
            template.category = category;
        }
        if let Some(assigned_to) = command.assigned_to {
            template.assigned_to = Some(assigned_to);
        }
        let timing_changed = match new_rule {
            Some(rule) if rule.timing_differs(&template.rule) => {
                template.rule = rule;
                true
            }
            _ => false,
        };
        template.updated_at = now;

        let mut tx = self.db.pool().begin().await?;
        TaskTemplateRepository::update_template(&mut tx, &template).await?;
        tx.commit().await?;
        info!(household_id, template_id, timing_changed, "updated task template");

        let (generated, removed) = if timing_changed && template.is_active {
            let recipient = self.recipient(household_id, &template.recipient_id).await?;
            let outcome = self
                .trigger
                .reconcile(
                    &recipient,
                    SoftDeleteScope::TaskTemplate(template_id),
                    TemplateSelector::TaskTemplate(template_id),
                    now,
                )
                .await?;
            (outcome.created, outcome.removed)
        } else {
            (0, 0)
        };

        Ok(TemplateMutation {
            template,
            generated,
            removed,
            success_message: "Task template updated".to_string(),
        })
    }

    /// Deactivate or reactivate a template
    pub async fn set_active(
        &self,
        household_id: &str,
        template_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<TaskTemplate>> {
        let mut template = self.get_template(household_id, template_id).await?;
        if template.is_active == active {
            return Ok(TemplateMutation {
                template,
                generated: 0,
                removed: 0,
                success_message: "Task template unchanged".to_string(),
            });
        }

        template.is_active = active;
        template.updated_at = now;
        let mut tx = self.db.pool().begin().await?;
        TaskTemplateRepository::update_template(&mut tx, &template).await?;
        tx.commit().await?;
        info!(household_id, template_id, active, "changed task template state");

        let (generated, removed, message) = if active {
            let recipient = self.recipient(household_id, &template.recipient_id).await?;
            let generated = self
                .trigger
                .generate(&recipient, TemplateSelector::TaskTemplate(template_id), now)
                .await?;
            (generated, 0, "Task template reactivated")
        } else {
            let removed = self
                .trigger
                .retire(household_id, SoftDeleteScope::TaskTemplate(template_id), now)
                .await?;
            (0, removed, "Task template deactivated")
        };

        Ok(TemplateMutation {
            template,
            generated,
            removed,
            success_message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commands::recurrence::RecurrenceInput;
    use crate::domain::ports::{BroadcastPublisher, GenerationGate};
    use crate::domain::test_utils::*;
    use crate::storage::InstanceRepository;
    use std::sync::Arc;

    fn service(db: &DbConnection) -> TaskTemplateService {
        let trigger = ScheduleTrigger::new(
            db.clone(),
            GenerationGate::new(),
            Arc::new(BroadcastPublisher::default()),
        );
        TaskTemplateService::new(db.clone(), trigger)
    }

    fn daily_input(times: &[&str]) -> RecurrenceInput {
        RecurrenceInput {
            frequency: "daily".to_string(),
            times_of_day: times.iter().map(|t| t.to_string()).collect(),
            days_of_week: vec![],
            day_of_month: None,
        }
    }

    fn create_command(recipient_id: &str) -> CreateTaskTemplateCommand {
        CreateTaskTemplateCommand {
            recipient_id: recipient_id.to_string(),
            title_enc: "enc:walk".to_string(),
            description_enc: None,
            category: None,
            assigned_to: None,
            recurrence: daily_input(&["08:00"]),
        }
    }

    #[tokio::test]
    async fn test_create_generates_window() {
        let db = DbConnection::init_test().await.unwrap();
        let service = service(&db);
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;

        let result = service
            .create_template(&household.id, create_command(&recipient.id), utc("2026-03-01T06:00:00Z"))
            .await
            .unwrap();

        assert_eq!(result.generated, 3);
        assert_eq!(result.template.category, "general");
    }

    #[tokio::test]
    async fn test_create_for_unknown_recipient_is_not_found() {
        let db = DbConnection::init_test().await.unwrap();
        let service = service(&db);
        let household = create_household(&db).await;

        let err = service
            .create_template(&household.id, create_command("nobody"), utc("2026-03-01T06:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_content_only_edit_keeps_snapshots() {
        let db = DbConnection::init_test().await.unwrap();
        let service = service(&db);
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let now = utc("2026-03-01T06:00:00Z");
        let created = service
            .create_template(&household.id, create_command(&recipient.id), now)
            .await
            .unwrap();

        let result = service
            .update_template(
                &household.id,
                &created.template.id,
                UpdateTaskTemplateCommand {
                    title_enc: Some("enc:renamed".to_string()),
                    recurrence: Some(daily_input(&["08:00"])),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();

        assert_eq!(result.removed, 0);
        assert_eq!(result.generated, 0);
        let tasks = InstanceRepository::new(db.db.clone())
            .list_tasks_between(&recipient.id, now, utc("2026-03-05T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.title_enc == "enc:walk"));
    }

    #[tokio::test]
    async fn test_timing_edit_reconciles() {
        let db = DbConnection::init_test().await.unwrap();
        let service = service(&db);
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let now = utc("2026-03-01T06:00:00Z");
        let created = service
            .create_template(&household.id, create_command(&recipient.id), now)
            .await
            .unwrap();

        let result = service
            .update_template(
                &household.id,
                &created.template.id,
                UpdateTaskTemplateCommand {
                    recurrence: Some(daily_input(&["09:30"])),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();

        assert_eq!(result.removed, 3);
        assert_eq!(result.generated, 3);
    }

    #[tokio::test]
    async fn test_deactivate_then_reactivate() {
        let db = DbConnection::init_test().await.unwrap();
        let service = service(&db);
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let now = utc("2026-03-01T06:00:00Z");
        let created = service
            .create_template(&household.id, create_command(&recipient.id), now)
            .await
            .unwrap();
        let id = created.template.id;

        let off = service.set_active(&household.id, &id, false, now).await.unwrap();
        assert_eq!(off.removed, 3);
        assert!(!off.template.is_active);

        let on = service.set_active(&household.id, &id, true, now).await.unwrap();
        assert_eq!(on.generated, 3);

        let again = service.set_active(&household.id, &id, true, now).await.unwrap();
        assert_eq!(again.generated, 0);
    }
}
