use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::domain::local_time::parse_timezone;
use crate::error::ScheduleResult;

#[derive(Debug, Clone, PartialEq)]
pub struct Household {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The person receiving care. Owns the timezone every template resolves in.
#[derive(Debug, Clone, PartialEq)]
pub struct CareRecipient {
    pub id: String,
    pub household_id: String,
    pub name_enc: String,
    pub timezone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CareRecipient {
    pub fn tz(&self) -> ScheduleResult<Tz> {
        parse_timezone(&self.timezone)
    }
}
