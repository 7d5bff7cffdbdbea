//! Read model: everything on a recipient's plate for one local calendar day.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use crate::domain::local_time::resolve_instant;
use crate::domain::models::{
    AdministrationStatus, InstanceKind, MedicationAdministration, Shift, TaskInstance, TaskStatus,
};
use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::{DbConnection, HouseholdRepository, InstanceRepository, ShiftRepository};

/// One row of the day view. Content stays ciphertext.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub kind: InstanceKind,
    pub id: String,
    /// Template or medication schedule the entry came from; None when ad-hoc.
    pub source_id: Option<String>,
    pub title_enc: Option<String>,
    pub at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: String,
    pub is_overdue: bool,
    pub has_notes: bool,
}

impl ScheduleEntry {
    fn from_task(task: TaskInstance, now: DateTime<Utc>) -> Self {
        Self {
            kind: InstanceKind::Task,
            is_overdue: task.status == TaskStatus::Pending && task.scheduled_at < now,
            has_notes: task.notes_enc.is_some(),
            status: task.status.as_str().to_string(),
            id: task.id,
            source_id: task.template_id,
            title_enc: Some(task.title_enc),
            at: task.scheduled_at,
            ends_at: None,
        }
    }

    fn from_administration(log: MedicationAdministration, now: DateTime<Utc>) -> Self {
        Self {
            kind: InstanceKind::Medication,
            is_overdue: log.status == AdministrationStatus::Pending && log.scheduled_at < now,
            has_notes: log.notes_enc.is_some(),
            status: log.status.as_str().to_string(),
            id: log.id,
            source_id: log.schedule_id,
            title_enc: Some(log.dosage_enc),
            at: log.scheduled_at,
            ends_at: None,
        }
    }

    // Lateness on a shift is the missed-shift transition, not an overdue flag.
    fn from_shift(shift: Shift) -> Self {
        Self {
            kind: InstanceKind::Shift,
            is_overdue: false,
            has_notes: shift.notes_enc.is_some(),
            status: shift.status.as_str().to_string(),
            id: shift.id,
            source_id: shift.template_id,
            title_enc: shift.title_enc,
            at: shift.starts_at,
            ends_at: Some(shift.ends_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaySchedule {
    pub recipient_id: String,
    pub date: NaiveDate,
    pub timezone: String,
    pub entries: Vec<ScheduleEntry>,
}

#[derive(Clone)]
pub struct ScheduleViewService {
    household_repository: HouseholdRepository,
    instance_repository: InstanceRepository,
    shift_repository: ShiftRepository,
}

impl ScheduleViewService {
    pub fn new(db: DbConnection) -> Self {
        Self {
            household_repository: HouseholdRepository::new(db.clone()),
            instance_repository: InstanceRepository::new(db.clone()),
            shift_repository: ShiftRepository::new(db),
        }
    }

    /// Live instances whose instant falls on `date` in the recipient's
    /// timezone, ordered by time.
    pub async fn day_schedule(
        &self,
        household_id: &str,
        recipient_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> ScheduleResult<DaySchedule> {
        let recipient = self
            .household_repository
            .get_recipient(household_id, recipient_id)
            .await?
            .ok_or_else(|| ScheduleError::not_found("recipient", recipient_id))?;
        let tz = recipient.tz()?;

        let next = date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ScheduleError::Validation(format!("date {} is out of range", date)))?;
        let from = resolve_instant(date, NaiveTime::MIN, tz);
        let to = resolve_instant(next, NaiveTime::MIN, tz);

        let tasks = self
            .instance_repository
            .list_tasks_between(recipient_id, from, to)
            .await?;
        let logs = self
            .instance_repository
            .list_administrations_between(recipient_id, from, to)
            .await?;
        let shifts = self
            .shift_repository
            .list_shifts_between(recipient_id, from, to)
            .await?;

        let mut entries: Vec<ScheduleEntry> = tasks
            .into_iter()
            .map(|t| ScheduleEntry::from_task(t, now))
            .chain(logs.into_iter().map(|l| ScheduleEntry::from_administration(l, now)))
            .chain(shifts.into_iter().map(ScheduleEntry::from_shift))
            .collect();
        entries.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.id.cmp(&b.id)));

        Ok(DaySchedule {
            recipient_id: recipient.id,
            date,
            timezone: recipient.timezone,
            entries,
        })
    }
}
