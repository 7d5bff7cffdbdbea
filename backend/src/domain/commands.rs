//! Domain-level command and result types.
//!
//! Services take these rather than the wire DTOs in `shared`; the REST layer
//! maps between the two.

pub mod recurrence {
    use crate::domain::recurrence::{parse_time_of_day, Frequency, RecurrenceRule};
    use crate::error::ScheduleResult;

    /// A recurrence rule as the caller spelled it.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecurrenceInput {
        pub frequency: String,
        pub times_of_day: Vec<String>,
        pub days_of_week: Vec<u8>,
        pub day_of_month: Option<u32>,
    }

    impl RecurrenceInput {
        pub fn to_rule(&self) -> ScheduleResult<RecurrenceRule> {
            let times = self
                .times_of_day
                .iter()
                .map(|t| parse_time_of_day(t))
                .collect::<ScheduleResult<Vec<_>>>()?;
            RecurrenceRule::new(
                Frequency::parse(&self.frequency),
                times,
                self.days_of_week.clone(),
                self.day_of_month,
            )
        }
    }
}

pub mod households {
    use crate::domain::models::CareRecipient;
    use crate::domain::reconciliation::ReconcileOutcome;

    #[derive(Debug, Clone)]
    pub struct CreateHouseholdCommand {
        pub name: String,
    }

    #[derive(Debug, Clone)]
    pub struct CreateRecipientCommand {
        pub name_enc: String,
        pub timezone: String,
    }

    #[derive(Debug, Clone)]
    pub struct TimezoneChangeResult {
        pub recipient: CareRecipient,
        /// None when the timezone was unchanged.
        pub reconciled: Option<ReconcileOutcome>,
    }
}

/// Outcome shared by every template mutation.
#[derive(Debug, Clone)]
pub struct TemplateMutation<T> {
    pub template: T,
    /// Instances created by generation or reconciliation.
    pub generated: u64,
    /// Instances soft-deleted by cleanup or reconciliation.
    pub removed: u64,
    pub success_message: String,
}

pub mod task_templates {
    use super::recurrence::RecurrenceInput;

    #[derive(Debug, Clone)]
    pub struct CreateTaskTemplateCommand {
        pub recipient_id: String,
        pub title_enc: String,
        pub description_enc: Option<String>,
        pub category: Option<String>,
        pub assigned_to: Option<String>,
        pub recurrence: RecurrenceInput,
    }

    /// Fields left as None are unchanged.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateTaskTemplateCommand {
        pub title_enc: Option<String>,
        pub description_enc: Option<String>,
        pub category: Option<String>,
        pub assigned_to: Option<String>,
        pub recurrence: Option<RecurrenceInput>,
    }
}

pub mod medications {
    use super::recurrence::RecurrenceInput;

    #[derive(Debug, Clone)]
    pub struct CreateMedicationCommand {
        pub recipient_id: String,
        pub name_enc: String,
        pub dosage_enc: String,
        pub instructions_enc: Option<String>,
        pub is_prn: bool,
    }

    #[derive(Debug, Clone, Default)]
    pub struct UpdateMedicationCommand {
        pub name_enc: Option<String>,
        pub dosage_enc: Option<String>,
        pub instructions_enc: Option<String>,
        pub is_prn: Option<bool>,
    }

    #[derive(Debug, Clone)]
    pub struct AddScheduleCommand {
        pub recurrence: RecurrenceInput,
    }
}

pub mod shift_templates {
    use super::recurrence::RecurrenceInput;

    #[derive(Debug, Clone)]
    pub struct CreateShiftTemplateCommand {
        pub recipient_id: String,
        pub caregiver_id: String,
        pub title_enc: Option<String>,
        pub duration_minutes: u32,
        pub recurrence: RecurrenceInput,
    }

    #[derive(Debug, Clone, Default)]
    pub struct UpdateShiftTemplateCommand {
        pub caregiver_id: Option<String>,
        pub title_enc: Option<String>,
        pub duration_minutes: Option<u32>,
        pub recurrence: Option<RecurrenceInput>,
    }
}

pub mod care_log {
    use chrono::{DateTime, Utc};

    use crate::domain::models::AdministrationStatus;

    #[derive(Debug, Clone)]
    pub struct TaskOutcomeCommand {
        pub actor_id: String,
        pub notes_enc: Option<String>,
    }

    #[derive(Debug, Clone)]
    pub struct RecordAdministrationCommand {
        pub outcome: AdministrationStatus,
        pub actor_id: String,
        pub notes_enc: Option<String>,
    }

    #[derive(Debug, Clone)]
    pub struct LogPrnDoseCommand {
        pub medication_id: String,
        pub actor_id: String,
        pub notes_enc: Option<String>,
        /// Defaults to now.
        pub administered_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Clone)]
    pub struct CreateAdHocTaskCommand {
        pub recipient_id: String,
        pub title_enc: String,
        pub description_enc: Option<String>,
        pub category: Option<String>,
        pub assigned_to: Option<String>,
        pub scheduled_at: DateTime<Utc>,
    }
}

pub mod shifts {
    use crate::domain::models::Shift;

    #[derive(Debug, Clone)]
    pub struct SwapResult {
        pub original: Shift,
        pub replacement: Shift,
    }

    #[derive(Debug, Clone)]
    pub struct HandoffCommand {
        pub author_id: String,
        pub notes_enc: String,
    }
}

#[cfg(test)]
mod tests {
    use super::recurrence::RecurrenceInput;
    use crate::domain::recurrence::Frequency;
    use crate::error::ScheduleError;

    fn input(frequency: &str, times: &[&str]) -> RecurrenceInput {
        RecurrenceInput {
            frequency: frequency.to_string(),
            times_of_day: times.iter().map(|t| t.to_string()).collect(),
            days_of_week: vec![],
            day_of_month: None,
        }
    }

    #[test]
    fn test_recurrence_input_to_rule() {
        let rule = input("daily", &["20:00", "08:00"]).to_rule().unwrap();
        assert_eq!(rule.frequency, Frequency::Daily);
        assert_eq!(rule.times_of_day.len(), 2);
        assert!(rule.times_of_day[0] < rule.times_of_day[1]);
    }

    #[test]
    fn test_recurrence_input_rejects_bad_parts() {
        assert!(matches!(
            input("daily", &["25:00"]).to_rule(),
            Err(ScheduleError::InvalidTimeOfDay(_))
        ));
        assert!(matches!(
            input("biweekly", &["08:00"]).to_rule(),
            Err(ScheduleError::Validation(_))
        ));
        assert!(matches!(
            input("monthly", &["08:00"]).to_rule(),
            Err(ScheduleError::Validation(_))
        ));
    }
}
