//! Conversions between the `shared` wire types and domain models.

pub mod care_log_mapper;
pub mod household_mapper;
pub mod recurrence_mapper;
pub mod schedule_mapper;
pub mod shift_mapper;
pub mod template_mapper;

use chrono::{DateTime, Utc};

use crate::error::{ScheduleError, ScheduleResult};
use crate::storage::to_db_time;

pub(crate) fn timestamp(value: &DateTime<Utc>) -> String {
    to_db_time(value)
}

pub(crate) fn opt_timestamp(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.as_ref().map(timestamp)
}

/// Parse a client-supplied RFC 3339 timestamp.
pub(crate) fn parse_timestamp(field: &str, value: &str) -> ScheduleResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ScheduleError::Validation(format!("{} must be an RFC 3339 timestamp", field)))
}
