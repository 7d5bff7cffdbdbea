use shared::{
    CreateHouseholdRequest, CreateRecipientRequest, Household as SharedHousehold,
    Recipient as SharedRecipient, UpdateTimezoneResponse,
};

use super::timestamp;
use crate::domain::commands::households::{
    CreateHouseholdCommand, CreateRecipientCommand, TimezoneChangeResult,
};
use crate::domain::models::{CareRecipient, Household};

pub struct HouseholdMapper;

impl HouseholdMapper {
    pub fn to_create_household_command(request: CreateHouseholdRequest) -> CreateHouseholdCommand {
        CreateHouseholdCommand { name: request.name }
    }

    pub fn to_create_recipient_command(request: CreateRecipientRequest) -> CreateRecipientCommand {
        CreateRecipientCommand {
            name_enc: request.name_enc,
            timezone: request.timezone,
        }
    }

    pub fn to_household_dto(household: Household) -> SharedHousehold {
        SharedHousehold {
            created_at: timestamp(&household.created_at),
            id: household.id,
            name: household.name,
        }
    }

    pub fn to_recipient_dto(recipient: CareRecipient) -> SharedRecipient {
        SharedRecipient {
            created_at: timestamp(&recipient.created_at),
            updated_at: timestamp(&recipient.updated_at),
            id: recipient.id,
            household_id: recipient.household_id,
            name_enc: recipient.name_enc,
            timezone: recipient.timezone,
            is_active: recipient.is_active,
        }
    }

    pub fn to_timezone_response(result: TimezoneChangeResult) -> UpdateTimezoneResponse {
        let (removed, created, message) = match result.reconciled {
            Some(outcome) => (outcome.removed, outcome.created, "Timezone updated"),
            None => (0, 0, "Timezone unchanged"),
        };
        UpdateTimezoneResponse {
            recipient: Self::to_recipient_dto(result.recipient),
            removed,
            created,
            success_message: message.to_string(),
        }
    }
}
