use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::commands::shift_templates::{
    CreateShiftTemplateCommand, UpdateShiftTemplateCommand,
};
use crate::domain::commands::TemplateMutation;
use crate::domain::generation::TemplateSelector;
use crate::domain::models::{generate_id, CareRecipient, ShiftTemplate};
use crate::domain::trigger::ScheduleTrigger;
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{DbConnection, HouseholdRepository, ShiftTemplateRepository, SoftDeleteScope};

/// Longest shift a template may describe.
const MAX_SHIFT_MINUTES: u32 = 24 * 60;

fn validate_duration(minutes: u32) -> ScheduleResult<()> {
    if minutes == 0 || minutes > MAX_SHIFT_MINUTES {
        return Err(ScheduleError::Validation(format!(
            "shift duration must be between 1 and {} minutes",
            MAX_SHIFT_MINUTES
        )));
    }
    Ok(())
}

/// Service for recurring caregiver shifts
#[derive(Clone)]
pub struct ShiftTemplateService {
    db: DbConnection,
    template_repository: ShiftTemplateRepository,
    household_repository: HouseholdRepository,
    trigger: ScheduleTrigger,
}

impl ShiftTemplateService {
    pub fn new(db: DbConnection, trigger: ScheduleTrigger) -> Self {
        Self {
            template_repository: ShiftTemplateRepository::new(db.clone()),
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
    ) -> ScheduleResult<ShiftTemplate> {
        self.template_repository
            .get_template(household_id, template_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("shift template", template_id))
    }

    pub async fn create_template(
        &self,
        household_id: &str,
        command: CreateShiftTemplateCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<ShiftTemplate>> {
        let rule = command.recurrence.to_rule()?;
        validate_duration(command.duration_minutes)?;
        if command.caregiver_id.is_empty() {
            return Err(ScheduleError::Validation("a caregiver is required".to_string()));
        }
        let recipient = self.recipient(household_id, &command.recipient_id).await?;

        let template = ShiftTemplate {
            id: generate_id(),
            household_id: household_id.to_string(),
            recipient_id: recipient.id.clone(),
            caregiver_id: command.caregiver_id,
            title_enc: command.title_enc,
            rule,
            duration_minutes: command.duration_minutes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.template_repository.store_template(&template).await?;
        info!(household_id, template_id = %template.id, "created shift template");

        let generated = self
            .trigger
            .generate(&recipient, TemplateSelector::ShiftTemplate(&template.id), now)
            .await?;

        Ok(TemplateMutation {
            template,
            generated,
            removed: 0,
            success_message: "Shift template created".to_string(),
        })
    }

    /// Edit a shift template. Start times and duration are timing; a new
    /// caregiver or title only applies to shifts generated later.
    pub async fn update_template(
        &self,
        household_id: &str,
        template_id: &str,
        command: UpdateShiftTemplateCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<ShiftTemplate>> {
        let new_rule = command.recurrence.as_ref().map(|r| r.to_rule()).transpose()?;
        if let Some(minutes) = command.duration_minutes {
            validate_duration(minutes)?;
        }
        let mut template = self.get_template(household_id, template_id).await?;

        if let Some(caregiver_id) = command.caregiver_id {
            template.caregiver_id = caregiver_id;
        }
        if let Some(title_enc) = command.title_enc {
            template.title_enc = Some(title_enc);
        }
        let mut timing_changed = false;
        if let Some(rule) = new_rule {
            if rule.timing_differs(&template.rule) {
                template.rule = rule;
                timing_changed = true;
            }
        }
        if let Some(minutes) = command.duration_minutes {
            if minutes != template.duration_minutes {
                template.duration_minutes = minutes;
                timing_changed = true;
            }
        }
        template.updated_at = now;

        let mut tx = self.db.pool().begin().await?;
        ShiftTemplateRepository::update_template(&mut tx, &template).await?;
        tx.commit().await?;
        info!(household_id, template_id, timing_changed, "updated shift template");

        let (generated, removed) = if timing_changed && template.is_active {
            let recipient = self.recipient(household_id, &template.recipient_id).await?;
            let outcome = self
                .trigger
                .reconcile(
                    &recipient,
                    SoftDeleteScope::ShiftTemplate(template_id),
                    TemplateSelector::ShiftTemplate(template_id),
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
            success_message: "Shift template updated".to_string(),
        })
    }

    pub async fn set_active(
        &self,
        household_id: &str,
        template_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TemplateMutation<ShiftTemplate>> {
        let mut template = self.get_template(household_id, template_id).await?;
        if template.is_active == active {
            return Ok(TemplateMutation {
                template,
                generated: 0,
                removed: 0,
                success_message: "Shift template unchanged".to_string(),
            });
        }

        template.is_active = active;
        template.updated_at = now;
        let mut tx = self.db.pool().begin().await?;
        ShiftTemplateRepository::update_template(&mut tx, &template).await?;
        tx.commit().await?;
        info!(household_id, template_id, active, "changed shift template state");

        let (generated, removed, message) = if active {
            let recipient = self.recipient(household_id, &template.recipient_id).await?;
            let generated = self
                .trigger
                .generate(&recipient, TemplateSelector::ShiftTemplate(template_id), now)
                .await?;
            (generated, 0, "Shift template reactivated")
        } else {
            let removed = self
                .trigger
                .retire(household_id, SoftDeleteScope::ShiftTemplate(template_id), now)
                .await?;
            (0, removed, "Shift template deactivated")
        };

        Ok(TemplateMutation {
            template,
            generated,
            removed,
            success_message: message.to_string(),
        })
    }
}
