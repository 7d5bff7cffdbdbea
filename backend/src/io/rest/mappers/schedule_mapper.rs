use shared::{ScheduleItem, ScheduleItemKind, ScheduleResponse};

use super::timestamp;
use crate::domain::models::InstanceKind;
use crate::domain::schedule_view::{DaySchedule, ScheduleEntry};

pub struct ScheduleMapper;

impl ScheduleMapper {
    fn to_item(entry: ScheduleEntry) -> ScheduleItem {
        let kind = match entry.kind {
            InstanceKind::Task => ScheduleItemKind::Task,
            InstanceKind::Medication => ScheduleItemKind::Medication,
            InstanceKind::Shift => ScheduleItemKind::Shift,
        };
        ScheduleItem {
            kind,
            at: timestamp(&entry.at),
            ends_at: entry.ends_at.as_ref().map(timestamp),
            id: entry.id,
            source_id: entry.source_id,
            title_enc: entry.title_enc,
            status: entry.status,
            is_overdue: entry.is_overdue,
            has_notes: entry.has_notes,
        }
    }

    pub fn to_response(day: DaySchedule) -> ScheduleResponse {
        ScheduleResponse {
            recipient_id: day.recipient_id,
            date: day.date.format("%Y-%m-%d").to_string(),
            timezone: day.timezone,
            items: day.entries.into_iter().map(Self::to_item).collect(),
        }
    }
}
