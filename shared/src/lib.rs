//! Wire types for the care scheduling REST API.
//!
//! Timestamps are RFC 3339 strings and dates are `YYYY-MM-DD`. Every field
//! ending in `_enc` is ciphertext produced by the client; the server stores
//! and returns it untouched.

use serde::{Deserialize, Serialize};

/// A recurrence rule as sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRuleDto {
    /// "daily", "weekly" or "monthly"
    pub frequency: String,
    /// Local wall-clock times, "HH:MM"
    pub times_of_day: Vec<String>,
    /// 0 = Sunday .. 6 = Saturday; weekly rules only
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    /// 1..=31; monthly rules only
    #[serde(default)]
    pub day_of_month: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Households and recipients
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateHouseholdRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRecipientRequest {
    pub name_enc: String,
    /// IANA timezone identifier, e.g. "America/New_York"
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub household_id: String,
    pub name_enc: String,
    pub timezone: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTimezoneRequest {
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTimezoneResponse {
    pub recipient: Recipient,
    /// Pending instances retired by the re-resolution
    pub removed: u64,
    /// Instances created at the new local times
    pub created: u64,
    pub success_message: String,
}

/// Body of every activate/deactivate endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Task templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: String,
    pub recipient_id: String,
    pub title_enc: String,
    pub description_enc: Option<String>,
    pub category: String,
    pub assigned_to: Option<String>,
    pub recurrence: RecurrenceRuleDto,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskTemplateRequest {
    pub recipient_id: String,
    pub title_enc: String,
    #[serde(default)]
    pub description_enc: Option<String>,
    /// Defaults to "general"
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub recurrence: RecurrenceRuleDto,
}

/// Omitted fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateTaskTemplateRequest {
    #[serde(default)]
    pub title_enc: Option<String>,
    #[serde(default)]
    pub description_enc: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRuleDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplateResponse {
    pub template: TaskTemplate,
    pub generated: u64,
    pub removed: u64,
    pub success_message: String,
}

// ---------------------------------------------------------------------------
// Medications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub recipient_id: String,
    pub name_enc: String,
    pub dosage_enc: String,
    pub instructions_enc: Option<String>,
    /// As-needed medications are never scheduled
    pub is_prn: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMedicationRequest {
    pub recipient_id: String,
    pub name_enc: String,
    pub dosage_enc: String,
    #[serde(default)]
    pub instructions_enc: Option<String>,
    #[serde(default)]
    pub is_prn: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateMedicationRequest {
    #[serde(default)]
    pub name_enc: Option<String>,
    #[serde(default)]
    pub dosage_enc: Option<String>,
    #[serde(default)]
    pub instructions_enc: Option<String>,
    #[serde(default)]
    pub is_prn: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationResponse {
    pub medication: Medication,
    pub generated: u64,
    pub removed: u64,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationSchedule {
    pub id: String,
    pub medication_id: String,
    pub recurrence: RecurrenceRuleDto,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Used both to add a schedule and to change an existing one's timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationScheduleRequest {
    pub recurrence: RecurrenceRuleDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationScheduleResponse {
    pub schedule: MedicationSchedule,
    pub generated: u64,
    pub removed: u64,
    pub success_message: String,
}

// ---------------------------------------------------------------------------
// Shift templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftTemplate {
    pub id: String,
    pub recipient_id: String,
    pub caregiver_id: String,
    pub title_enc: Option<String>,
    pub duration_minutes: u32,
    pub recurrence: RecurrenceRuleDto,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShiftTemplateRequest {
    pub recipient_id: String,
    pub caregiver_id: String,
    #[serde(default)]
    pub title_enc: Option<String>,
    pub duration_minutes: u32,
    pub recurrence: RecurrenceRuleDto,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateShiftTemplateRequest {
    #[serde(default)]
    pub caregiver_id: Option<String>,
    #[serde(default)]
    pub title_enc: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRuleDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftTemplateResponse {
    pub template: ShiftTemplate,
    pub generated: u64,
    pub removed: u64,
    pub success_message: String,
}

// ---------------------------------------------------------------------------
// Care log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub recipient_id: String,
    /// None for ad-hoc tasks
    pub template_id: Option<String>,
    pub title_enc: String,
    pub description_enc: Option<String>,
    pub category: String,
    pub assigned_to: Option<String>,
    pub scheduled_at: String,
    /// "pending", "completed" or "skipped"
    pub status: String,
    pub notes_enc: Option<String>,
    pub completed_at: Option<String>,
    pub completed_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcomeRequest {
    pub actor_id: String,
    #[serde(default)]
    pub notes_enc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotateRequest {
    pub notes_enc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAdHocTaskRequest {
    pub recipient_id: String,
    pub title_enc: String,
    #[serde(default)]
    pub description_enc: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub scheduled_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
    pub success_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdministrationOutcome {
    Given,
    Skipped,
    Refused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Administration {
    pub id: String,
    pub recipient_id: String,
    pub medication_id: String,
    /// None for doses logged outside any schedule
    pub schedule_id: Option<String>,
    pub dosage_enc: String,
    pub scheduled_at: String,
    /// "pending", "given", "skipped" or "refused"
    pub status: String,
    pub notes_enc: Option<String>,
    pub administered_at: Option<String>,
    pub administered_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordAdministrationRequest {
    pub outcome: AdministrationOutcome,
    pub actor_id: String,
    #[serde(default)]
    pub notes_enc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPrnDoseRequest {
    pub medication_id: String,
    pub actor_id: String,
    #[serde(default)]
    pub notes_enc: Option<String>,
    /// Defaults to the time the request is handled
    #[serde(default)]
    pub administered_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdministrationResponse {
    pub administration: Administration,
    pub success_message: String,
}

// ---------------------------------------------------------------------------
// Shifts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub recipient_id: String,
    /// None for swap replacements and other one-off shifts
    pub template_id: Option<String>,
    pub caregiver_id: String,
    pub title_enc: Option<String>,
    pub starts_at: String,
    pub ends_at: String,
    /// "scheduled", "active", "completed", "missed" or "swapped"
    pub status: String,
    pub clock_in_at: Option<String>,
    pub clock_out_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftResponse {
    pub shift: Shift,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapShiftRequest {
    pub caregiver_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapShiftResponse {
    pub original: Shift,
    pub replacement: Shift,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffRequest {
    pub author_id: String,
    pub notes_enc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub id: String,
    pub shift_id: String,
    pub author_id: String,
    pub notes_enc: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffListResponse {
    pub handoffs: Vec<Handoff>,
}

// ---------------------------------------------------------------------------
// Schedule view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleItemKind {
    Task,
    Medication,
    Shift,
}

/// One entry of a recipient's day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub kind: ScheduleItemKind,
    pub id: String,
    pub source_id: Option<String>,
    /// Task title, medication dosage or shift title
    pub title_enc: Option<String>,
    pub at: String,
    /// Shifts only
    pub ends_at: Option<String>,
    pub status: String,
    /// Pending and past its instant, as of the request
    pub is_overdue: bool,
    pub has_notes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleQuery {
    /// Local date, "YYYY-MM-DD"; defaults to today in the recipient's timezone
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub recipient_id: String,
    pub date: String,
    pub timezone: String,
    pub items: Vec<ScheduleItem>,
}

// ---------------------------------------------------------------------------
// Settings and health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetSettingRequest {
    /// Dotted key, e.g. "generation.window_days"
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetSettingResponse {
    pub key: String,
    pub value: String,
    pub success_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub worker: String,
    pub last_started_at: Option<String>,
    pub last_success_at: Option<String>,
    pub last_error: Option<String>,
    pub last_error_at: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when a worker's latest run failed
    pub status: String,
    pub generation_suspended: bool,
    pub workers: Vec<WorkerHealth>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recurrence_defaults_when_omitted() {
        let rule: RecurrenceRuleDto =
            serde_json::from_str(r#"{"frequency":"daily","times_of_day":["08:00"]}"#).unwrap();
        assert!(rule.days_of_week.is_empty());
        assert_eq!(rule.day_of_month, None);
    }

    #[test]
    fn test_outcome_and_kind_are_lowercase_on_the_wire() {
        let request: RecordAdministrationRequest =
            serde_json::from_str(r#"{"outcome":"refused","actor_id":"c1"}"#).unwrap();
        assert_eq!(request.outcome, AdministrationOutcome::Refused);
        assert_eq!(
            serde_json::to_value(ScheduleItemKind::Medication).unwrap(),
            serde_json::json!("medication")
        );
    }
}
