use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::commands::households::{
    CreateHouseholdCommand, CreateRecipientCommand, TimezoneChangeResult,
};
use crate::domain::generation::TemplateSelector;
use crate::domain::local_time::parse_timezone;
use crate::domain::models::{generate_id, CareRecipient, Household};
use crate::domain::trigger::ScheduleTrigger;
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{DbConnection, HouseholdRepository, SoftDeleteScope};

/// Service for households and the people they care for
#[derive(Clone)]
pub struct RecipientService {
    db: DbConnection,
    household_repository: HouseholdRepository,
    trigger: ScheduleTrigger,
}

impl RecipientService {
    pub fn new(db: DbConnection, trigger: ScheduleTrigger) -> Self {
        Self {
            household_repository: HouseholdRepository::new(db.clone()),
            db,
            trigger,
        }
    }

    pub async fn create_household(
        &self,
        command: CreateHouseholdCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<Household> {
        let name = command.name.trim();
        if name.is_empty() {
            return Err(ScheduleError::Validation(
                "household name cannot be empty".to_string(),
            ));
        }
        let household = Household {
            id: generate_id(),
            name: name.to_string(),
            created_at: now,
        };
        self.household_repository.store_household(&household).await?;
        info!(household_id = %household.id, "created household");
        Ok(household)
    }

    pub async fn create_recipient(
        &self,
        household_id: &str,
        command: CreateRecipientCommand,
        now: DateTime<Utc>,
    ) -> ScheduleResult<CareRecipient> {
        parse_timezone(&command.timezone)?;
        if command.name_enc.is_empty() {
            return Err(ScheduleError::Validation(
                "recipient name cannot be empty".to_string(),
            ));
        }
        if self
            .household_repository
            .get_household(household_id)
            .await?
            .is_none()
        {
            return Err(ScheduleError::not_found("household", household_id));
        }

        let recipient = CareRecipient {
            id: generate_id(),
            household_id: household_id.to_string(),
            name_enc: command.name_enc,
            timezone: command.timezone,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.household_repository.store_recipient(&recipient).await?;
        info!(household_id, recipient_id = %recipient.id, timezone = %recipient.timezone, "created recipient");
        Ok(recipient)
    }

    pub async fn get_recipient(
        &self,
        household_id: &str,
        recipient_id: &str,
    ) -> ScheduleResult<CareRecipient> {
        self.household_repository
            .get_recipient(household_id, recipient_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("recipient", recipient_id))
    }

    /// Change a recipient's timezone and re-resolve every future pending
    /// instance against it.
    pub async fn update_timezone(
        &self,
        household_id: &str,
        recipient_id: &str,
        timezone: &str,
        now: DateTime<Utc>,
    ) -> ScheduleResult<TimezoneChangeResult> {
        parse_timezone(timezone)?;
        let mut recipient = self.get_recipient(household_id, recipient_id).await?;
        if recipient.timezone == timezone {
            return Ok(TimezoneChangeResult {
                recipient,
                reconciled: None,
            });
        }

        let mut tx = self.db.pool().begin().await?;
        HouseholdRepository::update_timezone(&mut tx, recipient_id, timezone, now).await?;
        tx.commit().await?;

        info!(
            household_id,
            recipient_id,
            from = %recipient.timezone,
            to = timezone,
            "recipient timezone changed"
        );
        recipient.timezone = timezone.to_string();
        recipient.updated_at = now;

        let outcome = self
            .trigger
            .reconcile(
                &recipient,
                SoftDeleteScope::Recipient(recipient_id),
                TemplateSelector::All,
                now,
            )
            .await?;

        Ok(TimezoneChangeResult {
            recipient,
            reconciled: Some(outcome),
        })
    }
}
