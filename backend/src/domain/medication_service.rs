use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::commands::medications::{
    AddScheduleCommand, CreateMedicationCommand, UpdateMedicationCommand,
};
use crate::domain::commands::recurrence::RecurrenceInput;
use crate::domain::commands::TemplateMutation;
use crate::domain::generation::TemplateSelector;
use crate::domain::models::{generate_id, CareRecipient, Medication, MedicationSchedule};
use crate::domain::trigger::ScheduleTrigger;
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{DbConnection, HouseholdRepository, MedicationRepository, SoftDeleteScope};

/// Service for medications and their dosing schedules.
///
/// A medication may carry several schedules; each schedule is its own
/// template as far as generation and cleanup are concerned.
#[derive(Clone)]
pub struct MedicationService {
    db: DbConnection,
    medication_repository: MedicationRepository,
    household_repository: HouseholdRepository,
    trigger: ScheduleTrigger,
}

impl MedicationService {
    pub fn new(db: DbConnection, trigger: ScheduleTrigger) -> Self {
        Self {
            medication_repository: MedicationRepository::new(db.clone()),
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

    pub async fn get_medication(
        &self,
        household_id: &str,
        medication_id: &str,
    ) -> ScheduleResult<Medication> {
        self.medication_repository
            .get_medication(household_id, medication_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("medication", medication_id))
    }

    pub async fn get_schedule(
        &self,
        household_id: &str,
        schedule_id: &str,
    ) -> ScheduleResult<MedicationSchedule> {
        self.medication_repository
            .get_schedule(household_id, schedule_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("medication schedule", schedule_id))
    }

    pub async fn create_medication(
        &self,
        household_id: &str,
        command: CreateMedicationCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<Medication> {
        if command.name_enc.is_empty() || command.dosage_enc.is_empty() {
            return Err(ScheduleError::Validation(
                "medication name and dosage are required".to_string(),
            ));
        }
        let recipient = self.recipient(household_id, &command.recipient_id).await?;

        let medication = Medication {
            id: generate_id(),
            household_id: household_id.to_string(),
            recipient_id: recipient.id,
            name_enc: command.name_enc,
            dosage_enc: command.dosage_enc,
            instructions_enc: command.instructions_enc,
            is_prn: command.is_prn,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.medication_repository.store_medication(&medication).await?;
        info!(household_id, medication_id = %medication.id, is_prn = medication.is_prn, "created medication");
        Ok(medication)
    }

    /// Edit a medication. Switching to or from as-needed changes what
    /// generation produces and retires or fills the window accordingly.
    pub async fn update_medication(
        &self,
        household_id: &str,
        medication_id: &str,
        command: UpdateMedicationCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<Medication>> {
        let mut medication = self.get_medication(household_id, medication_id).await?;
        if let Some(name_enc) = command.name_enc {
            medication.name_enc = name_enc;
        }
        if let Some(dosage_enc) = command.dosage_enc {
            medication.dosage_enc = dosage_enc;
        }
        if let Some(instructions_enc) = command.instructions_enc {
            medication.instructions_enc = Some(instructions_enc);
        }
        let prn_changed = match command.is_prn {
            Some(is_prn) if is_prn != medication.is_prn => {
                medication.is_prn = is_prn;
                true
            }
            _ => false,
        };
        medication.updated_at = now;

        let mut tx = self.db.pool().begin().await?;
        MedicationRepository::update_medication(&mut tx, &medication).await?;
        tx.commit().await?;
        info!(household_id, medication_id, prn_changed, "updated medication");

        let (generated, removed) = match (prn_changed && medication.is_active, medication.is_prn) {
            (false, _) => (0, 0),
            (true, true) => {
                let removed = self
                    .trigger
                    .retire(household_id, SoftDeleteScope::Medication(medication_id), now)
                    .await?;
                (0, removed)
            }
            (true, false) => {
                let recipient = self.recipient(household_id, &medication.recipient_id).await?;
                let generated = self
                    .trigger
                    .generate(&recipient, TemplateSelector::Medication(medication_id), now)
                    .await?;
                (generated, 0)
            }
        };

        Ok(TemplateMutation {
            template: medication,
            generated,
            removed,
            success_message: "Medication updated".to_string(),
        })
    }

    /// Stop a medication for good: every schedule is deactivated and their
    /// future pending administrations retired.
    pub async fn discontinue(
        &self,
        household_id: &str,
        medication_id: &str,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<Medication>> {
        let mut medication = self.get_medication(household_id, medication_id).await?;
        if !medication.is_active {
            return Ok(TemplateMutation {
                template: medication,
                generated: 0,
                removed: 0,
                success_message: "Medication already discontinued".to_string(),
            });
        }
        medication.is_active = false;
        medication.updated_at = now;

        let mut tx = self.db.pool().begin().await?;
        MedicationRepository::update_medication(&mut tx, &medication).await?;
        let schedules = MedicationRepository::deactivate_schedules(&mut tx, medication_id, now).await?;
        tx.commit().await?;
        info!(household_id, medication_id, schedules, "discontinued medication");

        let removed = self
            .trigger
            .retire(household_id, SoftDeleteScope::Medication(medication_id), now)
            .await?;

        Ok(TemplateMutation {
            template: medication,
            generated: 0,
            removed,
            success_message: "Medication discontinued".to_string(),
        })
    }

    pub async fn add_schedule(
        &self,
        household_id: &str,
        medication_id: &str,
        command: AddScheduleCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<MedicationSchedule>> {
        let rule = command.recurrence.to_rule()?;
        let medication = self.get_medication(household_id, medication_id).await?;
        if !medication.is_active {
            return Err(ScheduleError::Validation(
                "cannot schedule a discontinued medication".to_string(),
            ));
        }

        let schedule = MedicationSchedule {
            id: generate_id(),
            medication_id: medication.id.clone(),
            household_id: household_id.to_string(),
            rule,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let mut tx = self.db.pool().begin().await?;
        MedicationRepository::store_schedule(&mut tx, &schedule).await?;
        tx.commit().await?;
        info!(household_id, medication_id, schedule_id = %schedule.id, "added medication schedule");

        let generated = if medication.is_prn {
            0
        } else {
            let recipient = self.recipient(household_id, &medication.recipient_id).await?;
            self.trigger
                .generate(&recipient, TemplateSelector::MedicationSchedule(&schedule.id), now)
                .await?
        };

        Ok(TemplateMutation {
            template: schedule,
            generated,
            removed: 0,
            success_message: "Medication schedule added".to_string(),
        })
    }

    pub async fn update_schedule(
        &self,
        household_id: &str,
        schedule_id: &str,
        recurrence: RecurrenceInput,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<MedicationSchedule>> {
        let rule = recurrence.to_rule()?;
        let mut schedule = self.get_schedule(household_id, schedule_id).await?;
        if !rule.timing_differs(&schedule.rule) {
            return Ok(TemplateMutation {
                template: schedule,
                generated: 0,
                removed: 0,
                success_message: "Medication schedule unchanged".to_string(),
            });
        }
        schedule.rule = rule;
        schedule.updated_at = now;

        let mut tx = self.db.pool().begin().await?;
        MedicationRepository::update_schedule(&mut tx, &schedule).await?;
        tx.commit().await?;
        info!(household_id, schedule_id, "updated medication schedule timing");

        let (generated, removed) = if schedule.is_active {
            let medication = self.get_medication(household_id, &schedule.medication_id).await?;
            let recipient = self.recipient(household_id, &medication.recipient_id).await?;
            let outcome = self
                .trigger
                .reconcile(
                    &recipient,
                    SoftDeleteScope::MedicationSchedule(schedule_id),
                    TemplateSelector::MedicationSchedule(schedule_id),
                    now,
                )
                .await?;
            (outcome.created, outcome.removed)
        } else {
            (0, 0)
        };

        Ok(TemplateMutation {
            template: schedule,
            generated,
            removed,
            success_message: "Medication schedule updated".to_string(),
        })
    }

    /// Deactivate or reactivate one schedule; siblings are untouched
    pub async fn set_schedule_active(
        &self,
        household_id: &str,
        schedule_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<MedicationSchedule>> {
        let mut schedule = self.get_schedule(household_id, schedule_id).await?;
        if schedule.is_active == active {
            return Ok(TemplateMutation {
                template: schedule,
                generated: 0,
                removed: 0,
                success_message: "Medication schedule unchanged".to_string(),
            });
        }
        let medication = self.get_medication(household_id, &schedule.medication_id).await?;
        if active && !medication.is_active {
            return Err(ScheduleError::Validation(
                "cannot reactivate a schedule of a discontinued medication".to_string(),
            ));
        }

        schedule.is_active = active;
        schedule.updated_at = now;
        let mut tx = self.db.pool().begin().await?;
        MedicationRepository::update_schedule(&mut tx, &schedule).await?;
        tx.commit().await?;
        info!(household_id, schedule_id, active, "changed medication schedule state");

        let (generated, removed, message) = if active {
            let recipient = self.recipient(household_id, &medication.recipient_id).await?;
            let generated = self
                .trigger
                .generate(&recipient, TemplateSelector::MedicationSchedule(schedule_id), now)
                .await?;
            (generated, 0, "Medication schedule reactivated")
        } else {
            let removed = self
                .trigger
                .retire(household_id, SoftDeleteScope::MedicationSchedule(schedule_id), now)
                .await?;
            (0, removed, "Medication schedule deactivated")
        };

        Ok(TemplateMutation {
            template: schedule,
            generated,
            removed,
            success_message: message.to_string(),
        })
    }
}
