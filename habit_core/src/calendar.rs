//! Calendar-day normalization in the fixed reference timezone.
//!
//! Every date the engine sees is a `NaiveDate` taken in one configured UTC
//! offset. Timestamps are converted into that offset before the day is read,
//! so two instants are the same day only if they are the same day there.

use crate::{Config, Error, Frequency, Result};
use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Utc};
use std::ops::RangeInclusive;

/// Years a user supplied date may fall in
const SUPPORTED_YEARS: RangeInclusive<i32> = 1..=9999;

/// Fixed offset all day keys are computed in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceZone {
    offset: FixedOffset,
}

impl ReferenceZone {
    /// Build a zone from an offset in minutes east of UTC
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| Error::Config(format!("Invalid UTC offset: {} minutes", minutes)))?;
        Ok(Self { offset })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_offset_minutes(config.clock.utc_offset_minutes)
    }

    /// Calendar day an instant falls on in this zone
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.day_of(now)
    }

    /// Parse a user supplied date.
    ///
    /// Accepts a plain `YYYY-MM-DD` day, taken as-is in this zone, or an
    /// RFC 3339 timestamp, which is converted into this zone first. Years
    /// outside 1..=9999 are rejected.
    pub fn parse_day(&self, input: &str) -> Result<NaiveDate> {
        let input = input.trim();
        let day = match NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            Ok(day) => day,
            Err(_) => DateTime::parse_from_rfc3339(input)
                .map(|dt| self.day_of(dt.with_timezone(&Utc)))
                .map_err(|_| {
                    Error::Validation(format!(
                        "unparseable date '{}', expected YYYY-MM-DD or RFC 3339",
                        input
                    ))
                })?,
        };

        if !SUPPORTED_YEARS.contains(&day.year()) {
            return Err(Error::Validation(format!(
                "date {} is outside years {}..={}",
                day,
                SUPPORTED_YEARS.start(),
                SUPPORTED_YEARS.end()
            )));
        }
        Ok(day)
    }
}

/// First day of the period containing `day`
pub fn period_start(frequency: Frequency, day: NaiveDate) -> NaiveDate {
    match frequency {
        Frequency::Daily => day,
        Frequency::Weekly => week_start(day),
    }
}

/// Monday of the ISO week containing `day`
///
/// Clamped to `NaiveDate::MIN` for the partial week at the start of the
/// representable range.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    let back = Days::new(u64::from(day.weekday().num_days_from_monday()));
    day.checked_sub_days(back).unwrap_or(NaiveDate::MIN)
}

/// Start of the period immediately before the one starting at `start`,
/// or `None` at the start of the representable range
pub fn previous_period(frequency: Frequency, start: NaiveDate) -> Option<NaiveDate> {
    start.checked_sub_days(period_length(frequency))
}

/// Start of the period immediately after the one starting at `start`,
/// or `None` at the end of the representable range
pub fn next_period(frequency: Frequency, start: NaiveDate) -> Option<NaiveDate> {
    start.checked_add_days(period_length(frequency))
}

fn period_length(frequency: Frequency) -> Days {
    match frequency {
        Frequency::Daily => Days::new(1),
        Frequency::Weekly => Days::new(7),
    }
}

/// `YYYY-MM` label of the calendar month a day belongs to
pub fn month_label(day: NaiveDate) -> String {
    format!("{:04}-{:02}", day.year(), day.month())
}

pub fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_of_respects_offset() {
        // 20:00 UTC on the 4th is already the 5th at UTC+05:30
        let instant = Utc.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap();
        let ist = ReferenceZone::from_offset_minutes(330).unwrap();
        assert_eq!(ist.day_of(instant), day(2024, 3, 5));
        let utc = ReferenceZone::from_offset_minutes(0).unwrap();
        assert_eq!(utc.day_of(instant), day(2024, 3, 4));
    }

    #[test]
    fn test_parse_plain_day() {
        let zone = ReferenceZone::from_offset_minutes(-300).unwrap();
        assert_eq!(zone.parse_day("2024-02-29").unwrap(), day(2024, 2, 29));
    }

    #[test]
    fn test_parse_timestamp_converts_into_zone() {
        let zone = ReferenceZone::from_offset_minutes(-300).unwrap();
        // 02:00 UTC is still the previous evening at UTC-05:00
        assert_eq!(
            zone.parse_day("2024-03-05T02:00:00Z").unwrap(),
            day(2024, 3, 4)
        );
    }

    #[test]
    fn test_parse_garbage_is_validation_error() {
        let zone = ReferenceZone::from_offset_minutes(0).unwrap();
        assert!(matches!(
            zone.parse_day("yesterday"),
            Err(Error::Validation(_))
        ));
        assert!(zone.parse_day("2024-02-30").is_err());
    }

    #[test]
    fn test_invalid_offset_rejected() {
        assert!(ReferenceZone::from_offset_minutes(24 * 60).is_err());
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2024-03-04 is a Monday
        assert_eq!(week_start(day(2024, 3, 4)), day(2024, 3, 4));
        assert_eq!(week_start(day(2024, 3, 6)), day(2024, 3, 4));
        assert_eq!(week_start(day(2024, 3, 10)), day(2024, 3, 4));
        assert_eq!(week_start(day(2024, 3, 11)), day(2024, 3, 11));
    }

    #[test]
    fn test_week_spanning_year_boundary() {
        // 2025-01-01 is a Wednesday; its ISO week starts in 2024
        assert_eq!(week_start(day(2025, 1, 1)), day(2024, 12, 30));
    }

    #[test]
    fn test_period_stepping() {
        let monday = day(2024, 3, 4);
        assert_eq!(
            previous_period(Frequency::Weekly, monday),
            Some(day(2024, 2, 26))
        );
        assert_eq!(next_period(Frequency::Weekly, monday), Some(day(2024, 3, 11)));
        assert_eq!(previous_period(Frequency::Daily, monday), Some(day(2024, 3, 3)));
        assert_eq!(period_start(Frequency::Daily, monday), monday);
    }

    #[test]
    fn test_period_stepping_stops_at_range_ends() {
        assert_eq!(previous_period(Frequency::Daily, NaiveDate::MIN), None);
        assert_eq!(previous_period(Frequency::Weekly, NaiveDate::MIN), None);
        assert_eq!(next_period(Frequency::Daily, NaiveDate::MAX), None);
        assert_eq!(week_start(NaiveDate::MIN), NaiveDate::MIN);
        assert_eq!(week_start(NaiveDate::MAX).weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn test_parse_rejects_extreme_years() {
        let zone = ReferenceZone::from_offset_minutes(0).unwrap();
        assert!(matches!(
            zone.parse_day("-200000-01-01"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            zone.parse_day("+20000-01-01"),
            Err(Error::Validation(_))
        ));
        assert_eq!(zone.parse_day("0001-01-01").unwrap(), day(1, 1, 1));
    }

    #[test]
    fn test_month_helpers() {
        assert_eq!(month_label(day(2024, 3, 4)), "2024-03");
        assert!(same_month(day(2024, 3, 1), day(2024, 3, 31)));
        assert!(!same_month(day(2024, 3, 1), day(2025, 3, 1)));
    }
}
