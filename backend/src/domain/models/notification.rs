use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskOverdue,
    MedicationOverdue,
    HandoffPrompt,
    ShiftMissed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskOverdue => "task_overdue",
            NotificationKind::MedicationOverdue => "medication_overdue",
            NotificationKind::HandoffPrompt => "handoff_prompt",
            NotificationKind::ShiftMissed => "shift_missed",
        }
    }
}

/// Something worth telling the household about. Bodies never contain
/// decrypted content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub household_id: String,
    pub kind: NotificationKind,
    /// The instance the notification is about.
    pub ref_id: String,
    pub title: String,
    pub body: String,
}
