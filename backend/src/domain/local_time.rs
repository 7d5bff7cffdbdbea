//! Wall-clock to UTC resolution for a recipient's timezone.
//!
//! DST edges follow civil-time arithmetic and are accepted as-is:
//! - a skipped wall time (spring forward) lands on the instant produced by the
//!   offset in force before the jump, e.g. 02:30 becomes 03:30 daylight time
//! - a repeated wall time (fall back) resolves to its first occurrence

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{ScheduleError, ScheduleResult};

/// Parse an IANA timezone identifier.
pub fn parse_timezone(name: &str) -> ScheduleResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// Resolve `date` at `time` on the wall clock of `tz` to an absolute instant.
pub fn resolve_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let local = date.and_time(time);
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
        LocalResult::None => {
            let before = local - Duration::days(1);
            let offset_secs = tz
                .from_local_datetime(&before)
                .earliest()
                .map(|dt| dt.offset().fix().local_minus_utc())
                .unwrap_or(0);
            Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(offset_secs))))
        }
    }
}

/// The calendar date it currently is for someone living in `tz`.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ny() -> Tz {
        parse_timezone("America/New_York").unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_spring_forward_window_shifts_utc_hour() {
        let expected = ["2026-03-08T13:00:00Z", "2026-03-09T12:00:00Z", "2026-03-10T12:00:00Z"];
        for (offset, want) in expected.iter().enumerate() {
            let date = NaiveDate::from_ymd_opt(2026, 3, 8 + offset as u32).unwrap();
            assert_eq!(resolve_instant(date, at(8, 0), ny()), utc(want));
        }
    }

    #[test]
    fn test_nonexistent_wall_time_moves_forward() {
        // 02:30 does not exist on 2026-03-08 in New York
        let date = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let resolved = resolve_instant(date, at(2, 30), ny());
        assert_eq!(resolved, utc("2026-03-08T07:30:00Z"));
        assert_eq!(resolved.with_timezone(&ny()).time(), at(3, 30));
    }

    #[test]
    fn test_repeated_wall_time_uses_first_occurrence() {
        // 01:30 happens twice on 2026-11-01; the first is still EDT (UTC-4)
        let date = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        assert_eq!(
            resolve_instant(date, at(1, 30), ny()),
            utc("2026-11-01T05:30:00Z")
        );
    }

    #[test]
    fn test_invalid_timezone_is_a_configuration_error() {
        let err = parse_timezone("Mars/Olympus_Mons").unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidTimezone(_)));
    }

    #[test]
    fn test_today_in_uses_local_calendar() {
        // 03:00 UTC is still the previous evening in New York
        let now = utc("2026-06-02T03:00:00Z");
        assert_eq!(today_in(ny(), now), NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
        assert_eq!(today_in(chrono_tz::UTC, now), NaiveDate::from_ymd_opt(2026, 6, 2).unwrap());
    }
}
