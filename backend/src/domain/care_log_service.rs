//! Caregiver actions against materialized instances: completing and skipping
//! tasks, recording administrations, notes, and one-off entries.
//!
//! Ad-hoc entries carry no template or schedule, so generation, cleanup and
//! reconciliation never touch them.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::commands::care_log::{
    CreateAdHocTaskCommand, LogPrnDoseCommand, RecordAdministrationCommand, TaskOutcomeCommand,
};
use crate::domain::models::{
    generate_id, AdministrationStatus, InstanceRow, MedicationAdministration, TaskInstance,
    TaskStatus,
};
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{DbConnection, HouseholdRepository, InstanceRepository, MedicationRepository};

#[derive(Clone)]
pub struct CareLogService {
    db: DbConnection,
    instance_repository: InstanceRepository,
    medication_repository: MedicationRepository,
    household_repository: HouseholdRepository,
}

impl CareLogService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            instance_repository: InstanceRepository::new(db.clone()),
            medication_repository: MedicationRepository::new(db.clone()),
            household_repository: HouseholdRepository::new(db.clone()),
            db,
        }
    }

    async fn pending_task(&self, household_id: &str, task_id: &str) -> ScheduleResult<TaskInstance> {
        let task = self
            .instance_repository
            .get_task(household_id, task_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("task", task_id))?;
        if task.status != TaskStatus::Pending {
            return Err(ScheduleError::InvalidTransition {
                entity: "task",
                from: task.status.as_str().to_string(),
                to: "a new outcome".to_string(),
            });
        }
        Ok(task)
    }

    /// Error for a write that matched no row: the task was deleted or moved
    /// on between the read and the write.
    async fn stale_task(&self, household_id: &str, task_id: &str) -> ScheduleError {
        match self.instance_repository.get_task(household_id, task_id).await {
            Ok(Some(task)) => ScheduleError::InvalidTransition {
                entity: "task",
                from: task.status.as_str().to_string(),
                to: "a new outcome".to_string(),
            },
            Ok(None) => ScheduleError::not_found("task", task_id),
            Err(e) => e.into(),
        }
    }

    async fn stale_administration(&self, household_id: &str, administration_id: &str) -> ScheduleError {
        match self
            .instance_repository
            .get_administration(household_id, administration_id)
            .await
        {
            Ok(Some(log)) => ScheduleError::InvalidTransition {
                entity: "medication administration",
                from: log.status.as_str().to_string(),
                to: "a new outcome".to_string(),
            },
            Ok(None) => ScheduleError::not_found("medication administration", administration_id),
            Err(e) => e.into(),
        }
    }

    /// Mark a pending task completed by the acting caregiver
    pub async fn complete_task(
        &self,
        household_id: &str,
        task_id: &str,
        command: TaskOutcomeCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TaskInstance> {
        self.close_task(household_id, task_id, TaskStatus::Completed, command, now)
            .await
    }

    /// Mark a pending task skipped
    pub async fn skip_task(
        &self,
        household_id: &str,
        task_id: &str,
        command: TaskOutcomeCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TaskInstance> {
        self.close_task(household_id, task_id, TaskStatus::Skipped, command, now)
            .await
    }

    async fn close_task(
        &self,
        household_id: &str,
        task_id: &str,
        outcome: TaskStatus,
        command: TaskOutcomeCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TaskInstance> {
        let mut task = self.pending_task(household_id, task_id).await?;
        task.status = outcome;
        task.completed_at = Some(now);
        task.completed_by = Some(command.actor_id);
        if command.notes_enc.is_some() {
            task.notes_enc = command.notes_enc;
        }
        if !self
            .instance_repository
            .update_task(&task, TaskStatus::Pending)
            .await?
        {
            return Err(self.stale_task(household_id, task_id).await);
        }
        info!(household_id, task_id, status = outcome.as_str(), "closed task");
        Ok(task)
    }

    /// Attach caregiver notes. An annotated task survives reconciliation.
    pub async fn annotate_task(
        &self,
        household_id: &str,
        task_id: &str,
        notes_enc: String,
    ) -> ScheduleResult<TaskInstance> {
        if notes_enc.is_empty() {
            return Err(ScheduleError::Validation("notes cannot be empty".to_string()));
        }
        let mut task = self
            .instance_repository
            .get_task(household_id, task_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("task", task_id))?;
        task.notes_enc = Some(notes_enc);
        if !self.instance_repository.update_task(&task, task.status).await? {
            return Err(self.stale_task(household_id, task_id).await);
        }
        Ok(task)
    }

    /// Create a one-off task owned by no template
    pub async fn create_ad_hoc_task(
        &self,
        household_id: &str,
        command: CreateAdHocTaskCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TaskInstance> {
        if command.title_enc.is_empty() {
            return Err(ScheduleError::Validation("task title cannot be empty".to_string()));
        }
        let recipient = self
            .household_repository
            .get_recipient(household_id, &command.recipient_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("recipient", &command.recipient_id))?;

        let task = TaskInstance {
            id: generate_id(),
            household_id: household_id.to_string(),
            recipient_id: recipient.id,
            template_id: None,
            title_enc: command.title_enc,
            description_enc: command.description_enc,
            category: command.category.unwrap_or_else(|| "general".to_string()),
            assigned_to: command.assigned_to,
            scheduled_at: command.scheduled_at,
            status: TaskStatus::Pending,
            notes_enc: None,
            completed_at: None,
            completed_by: None,
            deleted_at: None,
            created_at: now,
        };
        let mut conn = self.db.pool().acquire().await?;
        InstanceRepository::insert_if_absent(&mut conn, &InstanceRow::Task(task.clone())).await?;
        info!(household_id, task_id = %task.id, "created ad-hoc task");
        Ok(task)
    }

    /// Record what happened to a pending administration
    pub async fn record_administration(
        &self,
        household_id: &str,
        administration_id: &str,
        command: RecordAdministrationCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<MedicationAdministration> {
        if command.outcome == AdministrationStatus::Pending {
            return Err(ScheduleError::Validation(
                "an administration outcome must be given, skipped or refused".to_string(),
            ));
        }
        let mut log = self
            .instance_repository
            .get_administration(household_id, administration_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("medication administration", administration_id))?;
        if log.status != AdministrationStatus::Pending {
            return Err(ScheduleError::InvalidTransition {
                entity: "medication administration",
                from: log.status.as_str().to_string(),
                to: command.outcome.as_str().to_string(),
            });
        }

        log.status = command.outcome;
        log.administered_at = Some(now);
        log.administered_by = Some(command.actor_id);
        if command.notes_enc.is_some() {
            log.notes_enc = command.notes_enc;
        }
        if !self
            .instance_repository
            .update_administration(&log, AdministrationStatus::Pending)
            .await?
        {
            return Err(self.stale_administration(household_id, administration_id).await);
        }
        info!(household_id, administration_id, status = log.status.as_str(), "recorded administration");
        Ok(log)
    }

    /// Attach caregiver notes to an administration
    pub async fn annotate_administration(
        &self,
        household_id: &str,
        administration_id: &str,
        notes_enc: String,
    ) -> ScheduleResult<MedicationAdministration> {
        if notes_enc.is_empty() {
            return Err(ScheduleError::Validation("notes cannot be empty".to_string()));
        }
        let mut log = self
            .instance_repository
            .get_administration(household_id, administration_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("medication administration", administration_id))?;
        log.notes_enc = Some(notes_enc);
        if !self.instance_repository.update_administration(&log, log.status).await? {
            return Err(self.stale_administration(household_id, administration_id).await);
        }
        Ok(log)
    }

    /// Log a dose given outside any schedule, typically of an as-needed medication
    pub async fn log_prn_dose(
        &self,
        household_id: &str,
        command: LogPrnDoseCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<MedicationAdministration> {
        let medication = self
            .medication_repository
            .get_medication(household_id, &command.medication_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("medication", &command.medication_id))?;
        if !medication.is_active {
            return Err(ScheduleError::Validation(
                "cannot log a dose of a discontinued medication".to_string(),
            ));
        }

        let given_at = command.administered_at.unwrap_or(now);
        let log = MedicationAdministration {
            id: generate_id(),
            household_id: household_id.to_string(),
            recipient_id: medication.recipient_id,
            medication_id: medication.id,
            schedule_id: None,
            dosage_enc: medication.dosage_enc,
            scheduled_at: given_at,
            status: AdministrationStatus::Given,
            notes_enc: command.notes_enc,
            administered_at: Some(given_at),
            administered_by: Some(command.actor_id),
            deleted_at: None,
            created_at: now,
        };
        let mut conn = self.db.pool().acquire().await?;
        InstanceRepository::insert_if_absent(&mut conn, &InstanceRow::Medication(log.clone()))
            .await?;
        info!(household_id, medication_id = %log.medication_id, "logged as-needed dose");
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generation::{GenerationEngine, TemplateSelector};
    use crate::domain::ports::GenerationGate;
    use crate::domain::test_utils::*;

    #[tokio::test]
    async fn test_complete_then_skip_is_rejected() {
        let db = DbConnection::init_test().await.unwrap();
        let service = CareLogService::new(db.db.clone());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let now = utc("2026-03-01T12:00:00Z");

        let task = service
            .create_ad_hoc_task(
                &household.id,
                CreateAdHocTaskCommand {
                    recipient_id: recipient.id.clone(),
                    title_enc: "enc:groceries".to_string(),
                    description_enc: None,
                    category: Some("errands".to_string()),
                    assigned_to: None,
                    scheduled_at: utc("2026-03-01T15:00:00Z"),
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(task.template_id, None);

        let outcome = || TaskOutcomeCommand {
            actor_id: "caregiver-1".to_string(),
            notes_enc: None,
        };
        let done = service
            .complete_task(&household.id, &task.id, outcome(), now)
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_by.as_deref(), Some("caregiver-1"));

        let err = service
            .skip_task(&household.id, &task.id, outcome(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_record_administration_outcomes() {
        let db = DbConnection::init_test().await.unwrap();
        let service = CareLogService::new(db.db.clone());
        let engine = GenerationEngine::new(db.db.clone(), GenerationGate::new());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let medication = create_medication(&db, &recipient, false).await;
        add_medication_schedule(&db, &medication, daily(&["08:00"])).await;
        let now = utc("2026-03-01T06:00:00Z");
        engine
            .generate_recipient(&recipient, TemplateSelector::All, now)
            .await
            .unwrap();

        let logs = InstanceRepository::new(db.db.clone())
            .list_administrations_between(&recipient.id, now, utc("2026-03-02T00:00:00Z"))
            .await
            .unwrap();
        let log = &logs[0];

        let refused = service
            .record_administration(
                &household.id,
                &log.id,
                RecordAdministrationCommand {
                    outcome: AdministrationStatus::Refused,
                    actor_id: "caregiver-1".to_string(),
                    notes_enc: Some("enc:spat it out".to_string()),
                },
                utc("2026-03-01T08:05:00Z"),
            )
            .await
            .unwrap();
        assert_eq!(refused.status, AdministrationStatus::Refused);
        assert!(refused.notes_enc.is_some());

        let err = service
            .record_administration(
                &household.id,
                &log.id,
                RecordAdministrationCommand {
                    outcome: AdministrationStatus::Given,
                    actor_id: "caregiver-1".to_string(),
                    notes_enc: None,
                },
                utc("2026-03-01T08:10:00Z"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_prn_doses_are_schedule_less() {
        let db = DbConnection::init_test().await.unwrap();
        let service = CareLogService::new(db.db.clone());
        let household = create_household(&db).await;
        let recipient = create_recipient(&db, &household.id, "UTC").await;
        let medication = create_medication(&db, &recipient, true).await;
        let now = utc("2026-03-01T12:00:00Z");

        let command = || LogPrnDoseCommand {
            medication_id: medication.id.clone(),
            actor_id: "caregiver-1".to_string(),
            notes_enc: None,
            administered_at: None,
        };
        let first = service.log_prn_dose(&household.id, command(), now).await.unwrap();
        let second = service.log_prn_dose(&household.id, command(), now).await.unwrap();

        assert_eq!(first.schedule_id, None);
        assert_eq!(first.status, AdministrationStatus::Given);
        assert_ne!(first.id, second.id);
        let logs = InstanceRepository::new(db.db.clone())
            .list_administrations_between(&recipient.id, now, utc("2026-03-02T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
    }
}
