use crate::error::ScheduleError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Lowercase English weekday names, Monday first. Weekday indices throughout
/// the crate follow this order: Mon=0 .. Sun=6.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Parses a clock value ("H:MM", "HH:MM" or "HH:MM:SS") to minutes past
/// midnight. Seconds are accepted and ignored. Hour 24 parses to 1440
/// regardless of minutes, so "24:00" can be used as an end-of-day end time.
pub fn parse_clock(raw: &str) -> Result<u32, ScheduleError> {
    let bad = || ScheduleError::InvalidInput(format!("malformed clock value '{}'", raw));

    let mut parts = raw.trim().split(':');
    let hour: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(bad)?;
    let minute: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(bad)?;
    if let Some(seconds) = parts.next() {
        // Only HH:MM:SS is tolerated beyond HH:MM.
        let _: u32 = seconds.parse().map_err(|_| bad())?;
        if parts.next().is_some() {
            return Err(bad());
        }
    }

    if hour == 24 {
        return Ok(MINUTES_PER_DAY);
    }
    if hour > 23 || minute > 59 {
        return Err(bad());
    }
    Ok(hour * 60 + minute)
}

/// An end time of "00:00" denotes end-of-day (1440). Start times keep 0.
pub fn promote_end(end: u32) -> u32 {
    if end == 0 {
        MINUTES_PER_DAY
    } else {
        end
    }
}

/// Shift length in minutes. An end at or before the start wraps past
/// midnight: 19:00-07:00 is 720 minutes.
pub fn shift_duration(start: u32, end: u32) -> u32 {
    if end > start {
        end - start
    } else {
        (MINUTES_PER_DAY - start) + end
    }
}

/// A shift is a night shift iff its (promoted) end is at or before its start.
/// 00:00-24:00 promotes to end=1440 and is a full day, not a night shift.
pub fn is_night_shift(start: u32, end: u32) -> bool {
    end <= start
}

/// Rest in minutes between a shift on day d and a shift on day d+1.
///
/// The first shift's end is taken as absolute minutes from midnight of day d,
/// so a night shift ends past 1440 and eats into day d+1. A negative result
/// means the two shifts overlap in real time.
pub fn rest_between(start1: u32, end1: u32, start2: u32) -> i32 {
    let end_abs = start1 + shift_duration(start1, end1);
    if end_abs > MINUTES_PER_DAY {
        start2 as i32 - (end_abs - MINUTES_PER_DAY) as i32
    } else {
        (MINUTES_PER_DAY - end_abs) as i32 + start2 as i32
    }
}

/// Maps a lowercase weekday name to its index (Mon=0 .. Sun=6).
pub fn weekday_index(name: &str) -> Option<usize> {
    let name = name.trim();
    WEEKDAY_NAMES.iter().position(|w| w.eq_ignore_ascii_case(name))
}
