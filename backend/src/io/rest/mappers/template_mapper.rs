use shared::{
    CreateMedicationRequest, CreateShiftTemplateRequest, CreateTaskTemplateRequest,
    Medication as SharedMedication, MedicationResponse, MedicationSchedule as SharedSchedule,
    MedicationScheduleResponse, ShiftTemplate as SharedShiftTemplate, ShiftTemplateResponse,
    TaskTemplate as SharedTaskTemplate, TaskTemplateResponse, UpdateMedicationRequest,
    UpdateShiftTemplateRequest, UpdateTaskTemplateRequest,
};

use super::recurrence_mapper::RecurrenceMapper;
use super::timestamp;
use crate::domain::commands::medications::{CreateMedicationCommand, UpdateMedicationCommand};
use crate::domain::commands::shift_templates::{
    CreateShiftTemplateCommand, UpdateShiftTemplateCommand,
};
use crate::domain::commands::task_templates::{
    CreateTaskTemplateCommand, UpdateTaskTemplateCommand,
};
use crate::domain::commands::TemplateMutation;
use crate::domain::models::{Medication, MedicationSchedule, ShiftTemplate, TaskTemplate};

/// Mapper for the three template kinds and their mutation results
pub struct TemplateMapper;

impl TemplateMapper {
    pub fn to_create_task_command(request: CreateTaskTemplateRequest) -> CreateTaskTemplateCommand {
        CreateTaskTemplateCommand {
            recipient_id: request.recipient_id,
            title_enc: request.title_enc,
            description_enc: request.description_enc,
            category: request.category,
            assigned_to: request.assigned_to,
            recurrence: RecurrenceMapper::to_input(request.recurrence),
        }
    }

    pub fn to_update_task_command(request: UpdateTaskTemplateRequest) -> UpdateTaskTemplateCommand {
        UpdateTaskTemplateCommand {
            title_enc: request.title_enc,
            description_enc: request.description_enc,
            category: request.category,
            assigned_to: request.assigned_to,
            recurrence: request.recurrence.map(RecurrenceMapper::to_input),
        }
    }

    pub fn to_task_template_dto(template: TaskTemplate) -> SharedTaskTemplate {
        SharedTaskTemplate {
            recurrence: RecurrenceMapper::to_dto(&template.rule),
            created_at: timestamp(&template.created_at),
            updated_at: timestamp(&template.updated_at),
            id: template.id,
            recipient_id: template.recipient_id,
            title_enc: template.title_enc,
            description_enc: template.description_enc,
            category: template.category,
            assigned_to: template.assigned_to,
            is_active: template.is_active,
        }
    }

    pub fn to_task_template_response(mutation: TemplateMutation<TaskTemplate>) -> TaskTemplateResponse {
        TaskTemplateResponse {
            template: Self::to_task_template_dto(mutation.template),
            generated: mutation.generated,
            removed: mutation.removed,
            success_message: mutation.success_message,
        }
    }

    pub fn to_create_medication_command(request: CreateMedicationRequest) -> CreateMedicationCommand {
        CreateMedicationCommand {
            recipient_id: request.recipient_id,
            name_enc: request.name_enc,
            dosage_enc: request.dosage_enc,
            instructions_enc: request.instructions_enc,
            is_prn: request.is_prn,
        }
    }

    pub fn to_update_medication_command(request: UpdateMedicationRequest) -> UpdateMedicationCommand {
        UpdateMedicationCommand {
            name_enc: request.name_enc,
            dosage_enc: request.dosage_enc,
            instructions_enc: request.instructions_enc,
            is_prn: request.is_prn,
        }
    }

    pub fn to_medication_dto(medication: Medication) -> SharedMedication {
        SharedMedication {
            created_at: timestamp(&medication.created_at),
            updated_at: timestamp(&medication.updated_at),
            id: medication.id,
            recipient_id: medication.recipient_id,
            name_enc: medication.name_enc,
            dosage_enc: medication.dosage_enc,
            instructions_enc: medication.instructions_enc,
            is_prn: medication.is_prn,
            is_active: medication.is_active,
        }
    }

    pub fn to_medication_response(mutation: TemplateMutation<Medication>) -> MedicationResponse {
        MedicationResponse {
            medication: Self::to_medication_dto(mutation.template),
            generated: mutation.generated,
            removed: mutation.removed,
            success_message: mutation.success_message,
        }
    }

    pub fn to_schedule_dto(schedule: MedicationSchedule) -> SharedSchedule {
        SharedSchedule {
            recurrence: RecurrenceMapper::to_dto(&schedule.rule),
            created_at: timestamp(&schedule.created_at),
            updated_at: timestamp(&schedule.updated_at),
            id: schedule.id,
            medication_id: schedule.medication_id,
            is_active: schedule.is_active,
        }
    }

    pub fn to_schedule_response(
        mutation: TemplateMutation<MedicationSchedule>,
    ) -> MedicationScheduleResponse {
        MedicationScheduleResponse {
            schedule: Self::to_schedule_dto(mutation.template),
            generated: mutation.generated,
            removed: mutation.removed,
            success_message: mutation.success_message,
        }
    }

    pub fn to_create_shift_command(request: CreateShiftTemplateRequest) -> CreateShiftTemplateCommand {
        CreateShiftTemplateCommand {
            recipient_id: request.recipient_id,
            caregiver_id: request.caregiver_id,
            title_enc: request.title_enc,
            duration_minutes: request.duration_minutes,
            recurrence: RecurrenceMapper::to_input(request.recurrence),
        }
    }

    pub fn to_update_shift_command(request: UpdateShiftTemplateRequest) -> UpdateShiftTemplateCommand {
        UpdateShiftTemplateCommand {
            caregiver_id: request.caregiver_id,
            title_enc: request.title_enc,
            duration_minutes: request.duration_minutes,
            recurrence: request.recurrence.map(RecurrenceMapper::to_input),
        }
    }

    pub fn to_shift_template_dto(template: ShiftTemplate) -> SharedShiftTemplate {
        SharedShiftTemplate {
            recurrence: RecurrenceMapper::to_dto(&template.rule),
            created_at: timestamp(&template.created_at),
            updated_at: timestamp(&template.updated_at),
            id: template.id,
            recipient_id: template.recipient_id,
            caregiver_id: template.caregiver_id,
            title_enc: template.title_enc,
            duration_minutes: template.duration_minutes,
            is_active: template.is_active,
        }
    }

    pub fn to_shift_template_response(
        mutation: TemplateMutation<ShiftTemplate>,
    ) -> ShiftTemplateResponse {
        ShiftTemplateResponse {
            template: Self::to_shift_template_dto(mutation.template),
            generated: mutation.generated,
            removed: mutation.removed,
            success_message: mutation.success_message,
        }
    }
}
