//! Materialized occurrences: tasks, medication administrations and shifts.
//!
//! A null `template_id` (or `schedule_id` for medications) marks an ad-hoc
//! record that generation never touches.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    Task,
    Medication,
    Shift,
}

impl InstanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceKind::Task => "task",
            InstanceKind::Medication => "medication",
            InstanceKind::Shift => "shift",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Completed,
    Skipped,
}

impl TaskStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            "skipped" => Some(TaskStatus::Skipped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdministrationStatus {
    Pending,
    Given,
    Skipped,
    Refused,
}

impl AdministrationStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AdministrationStatus::Pending),
            "given" => Some(AdministrationStatus::Given),
            "skipped" => Some(AdministrationStatus::Skipped),
            "refused" => Some(AdministrationStatus::Refused),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdministrationStatus::Pending => "pending",
            AdministrationStatus::Given => "given",
            AdministrationStatus::Skipped => "skipped",
            AdministrationStatus::Refused => "refused",
        }
    }
}

/// Shift lifecycle.
///
/// ```text
/// scheduled ──clock in──▶ active ──clock out / end passed──▶ completed
///     │
///     ├──grace elapsed, no clock in──▶ missed
///     └──swap accepted──▶ swapped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftStatus {
    Scheduled,
    Active,
    Completed,
    Missed,
    Swapped,
}

impl ShiftStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(ShiftStatus::Scheduled),
            "active" => Some(ShiftStatus::Active),
            "completed" => Some(ShiftStatus::Completed),
            "missed" => Some(ShiftStatus::Missed),
            "swapped" => Some(ShiftStatus::Swapped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Scheduled => "scheduled",
            ShiftStatus::Active => "active",
            ShiftStatus::Completed => "completed",
            ShiftStatus::Missed => "missed",
            ShiftStatus::Swapped => "swapped",
        }
    }

    pub fn can_transition_to(self, next: ShiftStatus) -> bool {
        use ShiftStatus::*;
        matches!(
            (self, next),
            (Scheduled, Active) | (Scheduled, Missed) | (Scheduled, Swapped) | (Active, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ShiftStatus::Completed | ShiftStatus::Missed | ShiftStatus::Swapped
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskInstance {
    pub id: String,
    pub household_id: String,
    pub recipient_id: String,
    pub template_id: Option<String>,
    pub title_enc: String,
    pub description_enc: Option<String>,
    pub category: String,
    pub assigned_to: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub notes_enc: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MedicationAdministration {
    pub id: String,
    pub household_id: String,
    pub recipient_id: String,
    pub medication_id: String,
    pub schedule_id: Option<String>,
    pub dosage_enc: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: AdministrationStatus,
    pub notes_enc: Option<String>,
    pub administered_at: Option<DateTime<Utc>>,
    pub administered_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shift {
    pub id: String,
    pub household_id: String,
    pub recipient_id: String,
    pub template_id: Option<String>,
    pub caregiver_id: String,
    pub title_enc: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: ShiftStatus,
    pub clock_in_at: Option<DateTime<Utc>>,
    pub clock_out_at: Option<DateTime<Utc>>,
    pub notes_enc: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Notes left by the outgoing caregiver of a shift.
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftHandoff {
    pub id: String,
    pub shift_id: String,
    pub household_id: String,
    pub author_id: String,
    pub notes_enc: String,
    pub created_at: DateTime<Utc>,
}

/// A row the generation engine wants to insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceRow {
    Task(TaskInstance),
    Medication(MedicationAdministration),
    Shift(Shift),
}

impl InstanceRow {
    pub fn kind(&self) -> InstanceKind {
        match self {
            InstanceRow::Task(_) => InstanceKind::Task,
            InstanceRow::Medication(_) => InstanceKind::Medication,
            InstanceRow::Shift(_) => InstanceKind::Shift,
        }
    }
}
