//! Recurrence rules and the date matcher.
//!
//! Only three shapes are supported: daily, weekly on a day set, and monthly on
//! a fixed day-of-month. Anything else that comes out of storage is kept as
//! [`Frequency::Unsupported`] and never matches.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{ScheduleError, ScheduleResult};

/// How often a template recurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    /// A stored value this build does not understand.
    Unsupported(String),
}

impl Frequency {
    pub fn parse(value: &str) -> Self {
        match value {
            "daily" => Frequency::Daily,
            "weekly" => Frequency::Weekly,
            "monthly" => Frequency::Monthly,
            other => Frequency::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Unsupported(raw) => raw.as_str(),
        }
    }
}

/// A recurrence definition shared by every template kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Wall-clock times in the recipient's zone, sorted and deduplicated.
    pub times_of_day: Vec<NaiveTime>,
    /// 0 = Sunday .. 6 = Saturday. Empty means every day for weekly rules.
    pub days_of_week: Vec<u8>,
    pub day_of_month: Option<u32>,
}

impl RecurrenceRule {
    /// Build a validated rule from its parts.
    pub fn new(
        frequency: Frequency,
        mut times_of_day: Vec<NaiveTime>,
        mut days_of_week: Vec<u8>,
        day_of_month: Option<u32>,
    ) -> ScheduleResult<Self> {
        if let Frequency::Unsupported(raw) = &frequency {
            return Err(ScheduleError::Validation(format!(
                "unsupported frequency '{}'",
                raw
            )));
        }
        if times_of_day.is_empty() {
            return Err(ScheduleError::Validation(
                "at least one time of day is required".to_string(),
            ));
        }
        if let Some(day) = days_of_week.iter().find(|d| **d > 6) {
            return Err(ScheduleError::Validation(format!(
                "invalid day of week: {}. Must be 0-6 (Sunday-Saturday)",
                day
            )));
        }
        if frequency == Frequency::Monthly {
            match day_of_month {
                Some(day) if (1..=31).contains(&day) => {}
                _ => {
                    return Err(ScheduleError::Validation(
                        "monthly rules need a day of month between 1 and 31".to_string(),
                    ))
                }
            }
        }

        times_of_day.sort();
        times_of_day.dedup();
        days_of_week.sort_unstable();
        days_of_week.dedup();

        Ok(Self {
            frequency,
            times_of_day,
            days_of_week,
            day_of_month,
        })
    }

    /// Does an occurrence fall on `date`?
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        match self.frequency {
            Frequency::Daily => true,
            Frequency::Weekly => {
                self.days_of_week.is_empty()
                    || self
                        .days_of_week
                        .contains(&(date.weekday().num_days_from_sunday() as u8))
            }
            // Short months are skipped, never clamped to their last day.
            Frequency::Monthly => self.day_of_month == Some(date.day()),
            Frequency::Unsupported(_) => false,
        }
    }

    /// True when the two rules would materialize different instants.
    pub fn timing_differs(&self, other: &RecurrenceRule) -> bool {
        self != other
    }
}

/// Parse an `HH:MM` (or `HH:MM:SS`) wall-clock time.
pub fn parse_time_of_day(value: &str) -> ScheduleResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTimeOfDay(value.to_string()))
}

pub fn format_time_of_day(time: &NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn eight() -> Vec<NaiveTime> {
        vec![NaiveTime::from_hms_opt(8, 0, 0).unwrap()]
    }

    #[test]
    fn test_daily_matches_every_date() {
        let rule = RecurrenceRule::new(Frequency::Daily, eight(), vec![], None).unwrap();
        assert!(rule.matches_date(date(2026, 1, 1)));
        assert!(rule.matches_date(date(2026, 2, 28)));
    }

    #[test]
    fn test_weekly_day_set() {
        // 2026-03-09 is a Monday, 2026-03-10 a Tuesday
        let rule = RecurrenceRule::new(Frequency::Weekly, eight(), vec![1, 3], None).unwrap();
        assert!(rule.matches_date(date(2026, 3, 9)));
        assert!(!rule.matches_date(date(2026, 3, 10)));
        assert!(rule.matches_date(date(2026, 3, 11)));
    }

    #[test]
    fn test_weekly_without_days_matches_every_day() {
        let rule = RecurrenceRule::new(Frequency::Weekly, eight(), vec![], None).unwrap();
        for day in 1..=7 {
            assert!(rule.matches_date(date(2026, 3, day)));
        }
    }

    #[test]
    fn test_monthly_does_not_clamp_short_months() {
        let rule = RecurrenceRule::new(Frequency::Monthly, eight(), vec![], Some(31)).unwrap();
        assert!(rule.matches_date(date(2026, 1, 31)));
        assert!(!rule.matches_date(date(2026, 2, 28)));
        assert!(!rule.matches_date(date(2026, 4, 30)));
    }

    #[test]
    fn test_unsupported_frequency_fails_closed() {
        let rule = RecurrenceRule {
            frequency: Frequency::parse("biweekly"),
            times_of_day: eight(),
            days_of_week: vec![],
            day_of_month: None,
        };
        assert!(!rule.matches_date(date(2026, 3, 9)));
    }

    #[test]
    fn test_rule_validation() {
        assert!(RecurrenceRule::new(Frequency::Daily, vec![], vec![], None).is_err());
        assert!(RecurrenceRule::new(Frequency::Weekly, eight(), vec![7], None).is_err());
        assert!(RecurrenceRule::new(Frequency::Monthly, eight(), vec![], None).is_err());
        assert!(RecurrenceRule::new(Frequency::Monthly, eight(), vec![], Some(32)).is_err());
        assert!(
            RecurrenceRule::new(Frequency::Unsupported("hourly".into()), eight(), vec![], None)
                .is_err()
        );
    }

    #[test]
    fn test_times_are_sorted_and_deduplicated() {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        let rule =
            RecurrenceRule::new(Frequency::Daily, vec![t(20), t(8), t(20)], vec![], None).unwrap();
        assert_eq!(rule.times_of_day, vec![t(8), t(20)]);
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(
            parse_time_of_day("08:30").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert!(parse_time_of_day("8am").is_err());
        assert_eq!(format_time_of_day(&parse_time_of_day("21:05:00").unwrap()), "21:05");
    }
}
