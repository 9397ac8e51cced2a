//! Turning partial schedule descriptions into concrete local start times.
//!
//! Meetups carry a `YYYY-MM-DD` date key plus a 12-hour time; team games carry
//! a display string such as `"Mon 7:00 PM"` and optionally a day-of-month
//! hint. Every function here returns `None` on unparseable input so callers can
//! skip the item.

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, Weekday};

/// A wall-clock time parsed from a 12-hour string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour24: u32,
    pub minute: u32,
}

/// Parse `H:MM AM|PM` (surrounding whitespace and case ignored, optional
/// whitespace before the suffix).
pub fn parse_time_string(time: &str) -> Option<ClockTime> {
    let time = time.trim();
    let (hour_part, rest) = time.split_once(':')?;
    if hour_part.is_empty() || hour_part.len() > 2 || !is_ascii_digits(hour_part) {
        return None;
    }

    let minute_part = rest.get(..2)?;
    if !is_ascii_digits(minute_part) {
        return None;
    }
    let is_pm = match rest.get(2..)?.trim_start().to_ascii_uppercase().as_str() {
        "AM" => false,
        "PM" => true,
        _ => return None,
    };

    let hour12: u32 = hour_part.parse().ok()?;
    let minute: u32 = minute_part.parse().ok()?;
    if hour12 > 12 || minute > 59 {
        return None;
    }

    let mut hour24 = hour12 % 12;
    if is_pm {
        hour24 += 12;
    }
    Some(ClockTime { hour24, minute })
}

/// Start time of a liked meetup: `date_key` is `YYYY-MM-DD`, `time` is 12-hour.
pub fn build_meetup_date(date_key: &str, time: &str) -> Option<NaiveDateTime> {
    let parts: Vec<&str> = date_key.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return None;
    };
    let year: i32 = year.trim().parse().ok()?;
    let month: u32 = month.trim().parse().ok()?;
    let day: u32 = day.trim().parse().ok()?;

    let parsed = parse_time_string(time)?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(parsed.hour24, parsed.minute, 0)
}

/// Next start time of a team game described as `"<Wkd> <h:mm AM|PM>"`.
///
/// With a day-of-month hint in `1..=31` the game is placed on that day of the
/// current month, or of the following month once that moment is `<= now`.
/// Without a hint it is the nearest occurrence of the weekday strictly after
/// `now`.
pub fn build_team_game_date(
    weekday_and_time: &str,
    day: Option<u32>,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let (weekday, time) = split_weekday(weekday_and_time)?;
    let parsed = parse_time_string(time)?;

    if let Some(day) = day.filter(|d| (1..=31).contains(d)) {
        let candidate = date_with_overflow(now.year(), now.month0(), day)?
            .and_hms_opt(parsed.hour24, parsed.minute, 0)?;
        if candidate > now {
            return Some(candidate);
        }

        let date = candidate.date();
        return date_with_overflow(date.year(), date.month0() + 1, date.day())?
            .and_hms_opt(parsed.hour24, parsed.minute, 0);
    }

    let current = now.weekday().num_days_from_sunday();
    let target = weekday.num_days_from_sunday();
    let day_offset = (target + 7 - current) % 7;

    let candidate = now
        .date()
        .checked_add_days(Days::new(day_offset.into()))?
        .and_hms_opt(parsed.hour24, parsed.minute, 0)?;
    if candidate <= now {
        return candidate.checked_add_days(Days::new(7));
    }
    Some(candidate)
}

/// End of an event that starts at `start` and lasts `duration`.
pub fn event_end(start: NaiveDateTime, duration: Duration) -> NaiveDateTime {
    start + duration
}

fn split_weekday(value: &str) -> Option<(Weekday, &str)> {
    let value = value.trim();
    let prefix = value.get(..3)?;
    let rest = value.get(3..)?;

    let weekday = match prefix.to_ascii_lowercase().as_str() {
        "sun" => Weekday::Sun,
        "mon" => Weekday::Mon,
        "tue" => Weekday::Tue,
        "wed" => Weekday::Wed,
        "thu" => Weekday::Thu,
        "fri" => Weekday::Fri,
        "sat" => Weekday::Sat,
        _ => return None,
    };

    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let time = rest.trim_start();
    if time.is_empty() {
        return None;
    }
    Some((weekday, time))
}

/// Date for `day` of the zero-based `month0` of `year`, letting both the month
/// and a too-large day spill over into following months (e.g. Feb 31 -> Mar 3
/// in a non-leap year).
fn date_with_overflow(year: i32, month0: u32, day: u32) -> Option<NaiveDate> {
    let year = year.checked_add(i32::try_from(month0 / 12).ok()?)?;
    let first = NaiveDate::from_ymd_opt(year, month0 % 12 + 1, 1)?;
    first.checked_add_days(Days::new(u64::from(day.checked_sub(1)?)))
}

fn is_ascii_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
