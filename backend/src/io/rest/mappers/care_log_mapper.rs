use shared::{
    Administration, AdministrationOutcome, CreateAdHocTaskRequest, LogPrnDoseRequest,
    RecordAdministrationRequest, Task, TaskOutcomeRequest,
};

use super::{opt_timestamp, parse_timestamp, timestamp};
use crate::domain::commands::care_log::{
    CreateAdHocTaskCommand, LogPrnDoseCommand, RecordAdministrationCommand, TaskOutcomeCommand,
};
use crate::domain::models::{AdministrationStatus, MedicationAdministration, TaskInstance};
use crate::error::ScheduleResult;

pub struct CareLogMapper;

impl CareLogMapper {
    pub fn to_outcome_command(request: TaskOutcomeRequest) -> TaskOutcomeCommand {
        TaskOutcomeCommand {
            actor_id: request.actor_id,
            notes_enc: request.notes_enc,
        }
    }

    pub fn to_ad_hoc_task_command(request: CreateAdHocTaskRequest) -> ScheduleResult<CreateAdHocTaskCommand> {
        Ok(CreateAdHocTaskCommand {
            scheduled_at: parse_timestamp("scheduled_at", &request.scheduled_at)?,
            recipient_id: request.recipient_id,
            title_enc: request.title_enc,
            description_enc: request.description_enc,
            category: request.category,
            assigned_to: request.assigned_to,
        })
    }

    pub fn to_record_command(request: RecordAdministrationRequest) -> RecordAdministrationCommand {
        let outcome = match request.outcome {
            AdministrationOutcome::Given => AdministrationStatus::Given,
            AdministrationOutcome::Skipped => AdministrationStatus::Skipped,
            AdministrationOutcome::Refused => AdministrationStatus::Refused,
        };
        RecordAdministrationCommand {
            outcome,
            actor_id: request.actor_id,
            notes_enc: request.notes_enc,
        }
    }

    pub fn to_prn_command(request: LogPrnDoseRequest) -> ScheduleResult<LogPrnDoseCommand> {
        let administered_at = request
            .administered_at
            .as_deref()
            .map(|value| parse_timestamp("administered_at", value))
            .transpose()?;
        Ok(LogPrnDoseCommand {
            medication_id: request.medication_id,
            actor_id: request.actor_id,
            notes_enc: request.notes_enc,
            administered_at,
        })
    }

    pub fn to_task_dto(task: TaskInstance) -> Task {
        Task {
            scheduled_at: timestamp(&task.scheduled_at),
            completed_at: opt_timestamp(&task.completed_at),
            status: task.status.as_str().to_string(),
            id: task.id,
            recipient_id: task.recipient_id,
            template_id: task.template_id,
            title_enc: task.title_enc,
            description_enc: task.description_enc,
            category: task.category,
            assigned_to: task.assigned_to,
            notes_enc: task.notes_enc,
            completed_by: task.completed_by,
        }
    }

    pub fn to_administration_dto(log: MedicationAdministration) -> Administration {
        Administration {
            scheduled_at: timestamp(&log.scheduled_at),
            administered_at: opt_timestamp(&log.administered_at),
            status: log.status.as_str().to_string(),
            id: log.id,
            recipient_id: log.recipient_id,
            medication_id: log.medication_id,
            schedule_id: log.schedule_id,
            dosage_enc: log.dosage_enc,
            notes_enc: log.notes_enc,
            administered_by: log.administered_by,
        }
    }
}
