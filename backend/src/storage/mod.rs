//! # Storage Module
//!
//! SQLite persistence for the scheduling backend.
//!
//! ## Key Responsibilities
//!
//! - **Connection Management**: one pooled [`DbConnection`] with WAL, foreign keys and a
//!   bounded busy timeout so concurrent writers serialize instead of failing
//! - **Idempotency**: partial unique indexes on (template, scheduled instant[, schedule])
//!   for non-deleted rows; instance inserts are `ON CONFLICT DO NOTHING`
//! - **Repositories**: one struct per aggregate; write paths that must join a
//!   recipient's transaction take `&mut SqliteConnection`
//!
//! Timestamps are stored as RFC 3339 UTC text with second precision so string
//! comparison in SQL is chronological comparison.

pub mod connection;
pub mod repositories;

pub use connection::DbConnection;
#[cfg(test)]
pub use connection::TestDb;
pub use repositories::*;

use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::domain::recurrence::{format_time_of_day, parse_time_of_day, Frequency, RecurrenceRule};

/// Format an instant the way every timestamp column stores it.
pub fn to_db_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_db_time(value: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn get_time(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse_db_time(&raw)
}

pub(crate) fn get_opt_time(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.as_deref().map(parse_db_time).transpose()
}

/// Columns a recurrence rule is spread across.
pub(crate) struct RuleColumns {
    pub frequency: String,
    pub times_of_day: String,
    pub days_of_week: String,
    pub day_of_month: Option<i64>,
}

pub(crate) fn encode_rule(rule: &RecurrenceRule) -> Result<RuleColumns, serde_json::Error> {
    let times: Vec<String> = rule.times_of_day.iter().map(format_time_of_day).collect();
    Ok(RuleColumns {
        frequency: rule.frequency.as_str().to_string(),
        times_of_day: serde_json::to_string(&times)?,
        days_of_week: serde_json::to_string(&rule.days_of_week)?,
        day_of_month: rule.day_of_month.map(i64::from),
    })
}

/// Read a stored rule. Unknown frequencies are kept so they fail closed.
pub(crate) fn decode_rule(row: &SqliteRow) -> Result<RecurrenceRule, sqlx::Error> {
    let decode = |e: Box<dyn std::error::Error + Send + Sync>| sqlx::Error::Decode(e);

    let frequency: String = row.try_get("frequency")?;
    let times_raw: String = row.try_get("times_of_day")?;
    let days_raw: String = row.try_get("days_of_week")?;
    let day_of_month: Option<i64> = row.try_get("day_of_month")?;

    let times: Vec<String> = serde_json::from_str(&times_raw).map_err(|e| decode(Box::new(e)))?;
    let times_of_day = times
        .iter()
        .map(|t| parse_time_of_day(t))
        .collect::<Result<Vec<NaiveTime>, _>>()
        .map_err(|e| decode(Box::new(e)))?;
    let days_of_week: Vec<u8> =
        serde_json::from_str(&days_raw).map_err(|e| decode(Box::new(e)))?;

    Ok(RecurrenceRule {
        frequency: Frequency::parse(&frequency),
        times_of_day,
        days_of_week,
        day_of_month: day_of_month.and_then(|d| u32::try_from(d).ok()),
    })
}
