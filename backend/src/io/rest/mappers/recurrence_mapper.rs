use shared::RecurrenceRuleDto;

use crate::domain::commands::recurrence::RecurrenceInput;
use crate::domain::recurrence::{format_time_of_day, RecurrenceRule};

pub struct RecurrenceMapper;

impl RecurrenceMapper {
    pub fn to_input(dto: RecurrenceRuleDto) -> RecurrenceInput {
        RecurrenceInput {
            frequency: dto.frequency,
            times_of_day: dto.times_of_day,
            days_of_week: dto.days_of_week,
            day_of_month: dto.day_of_month,
        }
    }

    pub fn to_dto(rule: &RecurrenceRule) -> RecurrenceRuleDto {
        RecurrenceRuleDto {
            frequency: rule.frequency.as_str().to_string(),
            times_of_day: rule.times_of_day.iter().map(format_time_of_day).collect(),
            days_of_week: rule.days_of_week.clone(),
            day_of_month: rule.day_of_month,
        }
    }
}
