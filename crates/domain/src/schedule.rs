//! Weekly schedules — day-of-week sets and alarm next-occurrence math.
//!
//! Days are numbered Monday = 1 … Sunday = 7 and stored as a bitmask with
//! bit 0 = Monday … bit 6 = Sunday. All computations run in naive local
//! time; the caller supplies "now" so the logic stays pure and testable.

use std::time::Duration;

use chrono::{Datelike, Days, NaiveDateTime, NaiveTime};

use crate::error::ValidationError;

/// A non-empty set of weekdays, stored as a 7-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySet(u8);

impl DaySet {
    /// Build a set from a raw bitmask (bit 0 = Monday … bit 6 = Sunday).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDayMask`] when the mask is zero
    /// or has bits above Sunday set.
    pub fn from_mask(mask: u8) -> Result<Self, ValidationError> {
        if mask == 0 || mask > 0b0111_1111 {
            return Err(ValidationError::InvalidDayMask(mask));
        }
        Ok(Self(mask))
    }

    /// Build a set from case-insensitive day tokens (full names or common
    /// abbreviations, e.g. `["mon", "Friday"]`).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownDayToken`] for an unrecognised
    /// token, or [`ValidationError::InvalidDayMask`] when the list is empty.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mask = 0u8;
        for token in tokens {
            let day = parse_day_token(token.as_ref())
                .ok_or_else(|| ValidationError::UnknownDayToken(token.as_ref().to_string()))?;
            mask |= 1 << (day - 1);
        }
        Self::from_mask(mask)
    }

    /// Whether the set contains the given day (Monday = 1 … Sunday = 7).
    #[must_use]
    pub fn contains(self, day: u8) -> bool {
        (1..=7).contains(&day) && self.0 & (1 << (day - 1)) != 0
    }

    /// The raw bitmask.
    #[must_use]
    pub fn mask(self) -> u8 {
        self.0
    }
}

fn parse_day_token(token: &str) -> Option<u8> {
    match token.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(1),
        "tue" | "tues" | "tuesday" => Some(2),
        "wed" | "weds" | "wednesday" => Some(3),
        "thu" | "thur" | "thurs" | "thursday" => Some(4),
        "fri" | "friday" => Some(5),
        "sat" | "saturday" => Some(6),
        "sun" | "sunday" => Some(7),
        _ => None,
    }
}

/// Delay until the next occurrence of a weekly alarm.
///
/// Scans days `1..=7`; the first masked day `d >= curDay` wins, where the
/// strictly-later time-of-day comparison only applies when `d == curDay`.
/// When no day matches this week, the masked day with the largest absolute
/// distance from `curDay` is scheduled next week (ties broken by the last
/// day scanned; a distance of zero means exactly seven days out).
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTimeOfDay`] when `hour`/`minute`/
/// `second` do not form a valid time of day.
pub fn next_alarm_delay(
    days: DaySet,
    hour: u8,
    minute: u8,
    second: u8,
    now: NaiveDateTime,
) -> Result<Duration, ValidationError> {
    let target = NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
        .ok_or(ValidationError::InvalidTimeOfDay {
            hour,
            minute,
            second,
        })?;

    let cur_day = u8::try_from(now.weekday().number_from_monday()).unwrap_or(1);

    let mut next_day = 0u8;
    let mut far_diff = -1i16;
    let mut far_day = 0u8;
    for d in 1..=7u8 {
        if d >= cur_day && days.contains(d) {
            if d > cur_day || target > now.time() {
                next_day = d;
                break;
            }
        }
        let diff = (i16::from(cur_day) - i16::from(d)).abs();
        if days.contains(d) && diff >= far_diff {
            far_diff = diff;
            far_day = d;
        }
    }

    let days_ahead = if next_day != 0 {
        u64::from(next_day - cur_day)
    } else if far_day == cur_day {
        7
    } else {
        u64::from((7 + far_day - cur_day) % 7)
    };

    let exec = now
        .date()
        .checked_add_days(Days::new(days_ahead))
        .map(|date| date.and_time(target))
        .ok_or(ValidationError::InvalidTimeOfDay {
            hour,
            minute,
            second,
        })?;

    Ok((exec - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        format!("{date}T{time}").parse().unwrap()
    }

    const HOUR: u64 = 3600;
    const DAY: u64 = 24 * HOUR;

    #[test]
    fn should_reject_zero_mask() {
        assert_eq!(
            DaySet::from_mask(0),
            Err(ValidationError::InvalidDayMask(0))
        );
    }

    #[test]
    fn should_reject_mask_with_high_bit() {
        assert_eq!(
            DaySet::from_mask(0b1000_0001),
            Err(ValidationError::InvalidDayMask(0b1000_0001))
        );
    }

    #[test]
    fn should_parse_day_tokens_case_insensitively() {
        let set = DaySet::from_tokens(["MON", "Friday", "sun"]).unwrap();
        assert!(set.contains(1));
        assert!(set.contains(5));
        assert!(set.contains(7));
        assert!(!set.contains(3));
    }

    #[test]
    fn should_parse_common_abbreviations() {
        let set = DaySet::from_tokens(["tues", "weds", "thur"]).unwrap();
        assert_eq!(set.mask(), 0b0000_1110);
    }

    #[test]
    fn should_reject_unknown_token() {
        let err = DaySet::from_tokens(["funday"]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownDayToken("funday".to_string())
        );
    }

    #[test]
    fn should_reject_empty_token_list() {
        let err = DaySet::from_tokens(Vec::<&str>::new()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidDayMask(0));
    }

    #[test]
    fn should_pick_later_day_this_week_even_with_earlier_time() {
        // Wednesday 10:00, alarm Mon+Fri at 09:00 → Friday this week.
        let days = DaySet::from_tokens(["mon", "fri"]).unwrap();
        let now = at("2024-01-03", "10:00:00"); // a Wednesday
        let delay = next_alarm_delay(days, 9, 0, 0, now).unwrap();
        assert_eq!(delay, Duration::from_secs(2 * DAY - HOUR));
    }

    #[test]
    fn should_roll_over_a_full_week_when_todays_time_has_passed() {
        // Friday 09:30, alarm Fri at 09:00 → next Friday.
        let days = DaySet::from_tokens(["fri"]).unwrap();
        let now = at("2024-01-05", "09:30:00"); // a Friday
        let delay = next_alarm_delay(days, 9, 0, 0, now).unwrap();
        assert_eq!(delay, Duration::from_secs(7 * DAY - 30 * 60));
    }

    #[test]
    fn should_fire_today_when_target_time_is_still_ahead() {
        let days = DaySet::from_tokens(["wed"]).unwrap();
        let now = at("2024-01-03", "08:00:00"); // a Wednesday
        let delay = next_alarm_delay(days, 9, 30, 0, now).unwrap();
        assert_eq!(delay, Duration::from_secs(HOUR + 30 * 60));
    }

    #[test]
    fn should_wrap_to_earlier_weekday_next_week() {
        // Saturday, alarm Mon+Tue → Monday in two days.
        let days = DaySet::from_tokens(["mon", "tue"]).unwrap();
        let now = at("2024-01-06", "12:00:00"); // a Saturday
        let delay = next_alarm_delay(days, 9, 0, 0, now).unwrap();
        assert_eq!(delay, Duration::from_secs(2 * DAY - 3 * HOUR));
    }

    #[test]
    fn should_break_fallback_ties_towards_the_last_day_scanned() {
        // Sunday 10:00, alarm Sun at 09:00: only masked day is today and
        // its time has passed → exactly one week out.
        let days = DaySet::from_tokens(["sun"]).unwrap();
        let now = at("2024-01-07", "10:00:00"); // a Sunday
        let delay = next_alarm_delay(days, 9, 0, 0, now).unwrap();
        assert_eq!(delay, Duration::from_secs(7 * DAY - HOUR));
    }

    #[test]
    fn should_reject_invalid_time_of_day() {
        let days = DaySet::from_tokens(["mon"]).unwrap();
        let now = at("2024-01-03", "10:00:00");
        let err = next_alarm_delay(days, 24, 0, 0, now).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidTimeOfDay {
                hour: 24,
                minute: 0,
                second: 0
            }
        );
    }

    #[test]
    fn should_fire_at_second_granularity() {
        let days = DaySet::from_tokens(["wed"]).unwrap();
        let now = at("2024-01-03", "09:00:00");
        let delay = next_alarm_delay(days, 9, 0, 30, now).unwrap();
        assert_eq!(delay, Duration::from_secs(30));
    }
}
