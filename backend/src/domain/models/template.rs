//! Recurring definitions. Content fields are ciphertext and are copied, never
//! referenced, into the instances generated from them.

use chrono::{DateTime, Utc};

use crate::domain::recurrence::RecurrenceRule;

#[derive(Debug, Clone, PartialEq)]
pub struct TaskTemplate {
    pub id: String,
    pub household_id: String,
    pub recipient_id: String,
    pub title_enc: String,
    pub description_enc: Option<String>,
    pub category: String,
    pub assigned_to: Option<String>,
    pub rule: RecurrenceRule,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Medication {
    pub id: String,
    pub household_id: String,
    pub recipient_id: String,
    pub name_enc: String,
    pub dosage_enc: String,
    pub instructions_enc: Option<String>,
    /// As-needed medications are only ever logged by hand.
    pub is_prn: bool,
    /// False once the medication is discontinued.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One timing rule of a medication. A medication may carry several.
#[derive(Debug, Clone, PartialEq)]
pub struct MedicationSchedule {
    pub id: String,
    pub medication_id: String,
    pub household_id: String,
    pub rule: RecurrenceRule,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A medication paired with one of its schedules, the unit generation works on.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledMedication {
    pub medication: Medication,
    pub schedule: MedicationSchedule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShiftTemplate {
    pub id: String,
    pub household_id: String,
    pub recipient_id: String,
    pub caregiver_id: String,
    pub title_enc: Option<String>,
    /// Times of day are shift start times.
    pub rule: RecurrenceRule,
    pub duration_minutes: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
