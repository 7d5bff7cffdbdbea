//! Factories shared by domain and storage tests.

use chrono::{DateTime, NaiveTime, Utc};

use crate::domain::models::{
    generate_id, CareRecipient, Household, Medication, MedicationSchedule, ShiftTemplate,
    TaskInstance, TaskStatus, TaskTemplate,
};
use crate::domain::recurrence::{Frequency, RecurrenceRule};
use crate::storage::{
    DbConnection, HouseholdRepository, MedicationRepository, ShiftTemplateRepository,
    TaskTemplateRepository,
};

pub fn utc(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

fn times(values: &[&str]) -> Vec<NaiveTime> {
    values
        .iter()
        .map(|t| NaiveTime::parse_from_str(t, "%H:%M").expect("valid HH:MM"))
        .collect()
}

pub fn daily(at: &[&str]) -> RecurrenceRule {
    RecurrenceRule::new(Frequency::Daily, times(at), vec![], None).unwrap()
}

pub fn weekly(at: &[&str], days: &[u8]) -> RecurrenceRule {
    RecurrenceRule::new(Frequency::Weekly, times(at), days.to_vec(), None).unwrap()
}

pub async fn create_household(db: &DbConnection) -> Household {
    let household = Household {
        id: generate_id(),
        name: "Test household".to_string(),
        created_at: utc("2026-01-01T00:00:00Z"),
    };
    HouseholdRepository::new(db.clone())
        .store_household(&household)
        .await
        .unwrap();
    household
}

/// Stores the timezone verbatim so tests can plant invalid ones.
pub async fn create_recipient(db: &DbConnection, household_id: &str, timezone: &str) -> CareRecipient {
    let created_at = utc("2026-01-01T00:00:00Z");
    let recipient = CareRecipient {
        id: generate_id(),
        household_id: household_id.to_string(),
        name_enc: "enc:recipient".to_string(),
        timezone: timezone.to_string(),
        is_active: true,
        created_at,
        updated_at: created_at,
    };
    HouseholdRepository::new(db.clone())
        .store_recipient(&recipient)
        .await
        .unwrap();
    recipient
}

pub async fn create_task_template(
    db: &DbConnection,
    recipient: &CareRecipient,
    rule: RecurrenceRule,
) -> TaskTemplate {
    let created_at = utc("2026-01-01T00:00:00Z");
    let template = TaskTemplate {
        id: generate_id(),
        household_id: recipient.household_id.clone(),
        recipient_id: recipient.id.clone(),
        title_enc: "enc:title".to_string(),
        description_enc: None,
        category: "general".to_string(),
        assigned_to: None,
        rule,
        is_active: true,
        created_at,
        updated_at: created_at,
    };
    TaskTemplateRepository::new(db.clone())
        .store_template(&template)
        .await
        .unwrap();
    template
}

pub async fn create_medication(db: &DbConnection, recipient: &CareRecipient, is_prn: bool) -> Medication {
    let created_at = utc("2026-01-01T00:00:00Z");
    let medication = Medication {
        id: generate_id(),
        household_id: recipient.household_id.clone(),
        recipient_id: recipient.id.clone(),
        name_enc: "enc:name".to_string(),
        dosage_enc: "enc:dosage".to_string(),
        instructions_enc: None,
        is_prn,
        is_active: true,
        created_at,
        updated_at: created_at,
    };
    MedicationRepository::new(db.clone())
        .store_medication(&medication)
        .await
        .unwrap();
    medication
}

pub async fn add_medication_schedule(
    db: &DbConnection,
    medication: &Medication,
    rule: RecurrenceRule,
) -> MedicationSchedule {
    let created_at = utc("2026-01-01T00:00:00Z");
    let schedule = MedicationSchedule {
        id: generate_id(),
        medication_id: medication.id.clone(),
        household_id: medication.household_id.clone(),
        rule,
        is_active: true,
        created_at,
        updated_at: created_at,
    };
    let mut conn = db.pool().acquire().await.unwrap();
    MedicationRepository::store_schedule(&mut conn, &schedule)
        .await
        .unwrap();
    schedule
}

pub async fn create_shift_template(
    db: &DbConnection,
    recipient: &CareRecipient,
    rule: RecurrenceRule,
    duration_minutes: u32,
) -> ShiftTemplate {
    let created_at = utc("2026-01-01T00:00:00Z");
    let template = ShiftTemplate {
        id: generate_id(),
        household_id: recipient.household_id.clone(),
        recipient_id: recipient.id.clone(),
        caregiver_id: "caregiver-1".to_string(),
        title_enc: None,
        rule,
        duration_minutes,
        is_active: true,
        created_at,
        updated_at: created_at,
    };
    ShiftTemplateRepository::new(db.clone())
        .store_template(&template)
        .await
        .unwrap();
    template
}

/// An unsaved pending task for `recipient` at `at`.
pub fn pending_task(
    recipient: &CareRecipient,
    template_id: Option<&str>,
    at: DateTime<Utc>,
) -> TaskInstance {
    TaskInstance {
        id: generate_id(),
        household_id: recipient.household_id.clone(),
        recipient_id: recipient.id.clone(),
        template_id: template_id.map(str::to_string),
        title_enc: "enc:title".to_string(),
        description_enc: None,
        category: "general".to_string(),
        assigned_to: None,
        scheduled_at: at,
        status: TaskStatus::Pending,
        notes_enc: None,
        completed_at: None,
        completed_by: None,
        deleted_at: None,
        created_at: at,
    }
}
