use chrono::{Datelike, NaiveDate};
use log::warn;
use std::collections::BTreeSet;

use crate::clock::{self, MINUTES_PER_DAY};
use crate::error::ScheduleError;
use crate::models::{OrganizationSettings, TradingSunday};

/// Opening-hour slots are checked at this granularity.
pub const SLOT_MINUTES: u32 = 30;

/// Saturdays default to closing at 16:00 unless overridden per day.
const SATURDAY_CLOSE_CAP: u32 = 16 * 60;

/// Parses an ISO calendar date, tolerating a trailing time component.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ScheduleError> {
    let date_part = raw.split('T').next().unwrap_or(raw).trim();
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| ScheduleError::InvalidInput(format!("invalid date '{}': {}", raw, e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOpening {
    Open { open: u32, close: u32 },
    Closed,
}

/// Calendar facts for the month being scheduled: day/weekday layout, the
/// monthly hour norm, active trading Sundays and the opening-hours table.
#[derive(Debug, Clone)]
pub struct MonthContext {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    pub weekdays: Vec<u32>,
    pub saturdays: Vec<u32>,
    pub sundays: Vec<u32>,
    pub monthly_norm_minutes: u32,
    pub trading_sundays: BTreeSet<u32>,
    /// Indexed by weekday (Mon=0 .. Sun=6).
    pub opening: [DayOpening; 7],
    dates: Vec<NaiveDate>,
    weekday_by_day: Vec<usize>,
}

impl MonthContext {
    pub fn new(
        year: i32,
        month: u32,
        monthly_hours_norm: Option<u32>,
        settings: &OrganizationSettings,
        trading_sundays: &[TradingSunday],
    ) -> Result<Self, ScheduleError> {
        if year < 1970 {
            return Err(ScheduleError::InvalidInput(format!(
                "year {} is out of range",
                year
            )));
        }
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            ScheduleError::InvalidInput(format!("invalid year/month: {}-{}", year, month))
        })?;

        let next_month_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| ScheduleError::Internal("month arithmetic failed".to_string()))?;
        let days_in_month = next_month_first.pred_opt().map(|d| d.day()).unwrap_or(31);

        let mut dates = Vec::with_capacity(days_in_month as usize);
        let mut weekday_by_day = Vec::with_capacity(days_in_month as usize);
        let mut weekdays = Vec::new();
        let mut saturdays = Vec::new();
        let mut sundays = Vec::new();
        for day in 1..=days_in_month {
            let date = first + chrono::Days::new((day - 1) as u64);
            let weekday = date.weekday().num_days_from_monday() as usize;
            dates.push(date);
            weekday_by_day.push(weekday);
            match weekday {
                0..=4 => weekdays.push(day),
                5 => saturdays.push(day),
                _ => sundays.push(day),
            }
        }

        let monthly_norm_minutes = monthly_hours_norm
            .map(|h| h * 60)
            .unwrap_or(weekdays.len() as u32 * 8 * 60);

        let mut active_trading = BTreeSet::new();
        if settings.enable_trading_sundays {
            for ts in trading_sundays {
                if !ts.is_active {
                    continue;
                }
                let date = parse_date(&ts.date)?;
                if date.year() != year || date.month() != month {
                    continue;
                }
                if date.weekday().num_days_from_monday() != 6 {
                    warn!("trading sunday {} is not a Sunday, ignoring", ts.date);
                    continue;
                }
                active_trading.insert(date.day());
            }
        }

        let opening = build_opening_table(settings)?;

        Ok(MonthContext {
            year,
            month,
            days_in_month,
            weekdays,
            saturdays,
            sundays,
            monthly_norm_minutes,
            trading_sundays: active_trading,
            opening,
            dates,
            weekday_by_day,
        })
    }

    pub fn date(&self, day: u32) -> NaiveDate {
        self.dates[(day - 1) as usize]
    }

    pub fn date_string(&self, day: u32) -> String {
        self.date(day).format("%Y-%m-%d").to_string()
    }

    /// Weekday index of a day of the month (Mon=0 .. Sun=6).
    pub fn weekday(&self, day: u32) -> usize {
        self.weekday_by_day[(day - 1) as usize]
    }

    /// Mon-Sat, or a Sunday that is an active trading Sunday.
    pub fn workable_day(&self, day: u32) -> bool {
        self.weekday(day) < 6 || self.trading_sundays.contains(&day)
    }

    pub fn workable_days(&self) -> Vec<u32> {
        (1..=self.days_in_month)
            .filter(|&d| self.workable_day(d))
            .collect()
    }

    pub fn opening_for(&self, day: u32) -> DayOpening {
        self.opening[self.weekday(day)]
    }

    /// Days grouped by ISO week, in month order.
    pub fn iso_weeks(&self) -> Vec<Vec<u32>> {
        let mut weeks: Vec<Vec<u32>> = Vec::new();
        let mut current_key = None;
        for day in 1..=self.days_in_month {
            let iso = self.date(day).iso_week();
            let key = (iso.year(), iso.week());
            if current_key != Some(key) {
                current_key = Some(key);
                weeks.push(Vec::new());
            }
            if let Some(week) = weeks.last_mut() {
                week.push(day);
            }
        }
        weeks
    }

    /// Full 7-day blocks counted from day 1; a trailing partial block is
    /// dropped.
    pub fn calendar_blocks(&self) -> Vec<Vec<u32>> {
        let days: Vec<u32> = (1..=self.days_in_month).collect();
        days.chunks(7)
            .filter(|chunk| chunk.len() == 7)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

fn build_opening_table(settings: &OrganizationSettings) -> Result<[DayOpening; 7], ScheduleError> {
    let default_open = clock::parse_clock(&settings.store_open_time)?;
    let default_close = clock::promote_end(clock::parse_clock(&settings.store_close_time)?);

    let mut table = [DayOpening::Closed; 7];
    for weekday in 0..7 {
        table[weekday] = match weekday {
            0..=4 => DayOpening::Open {
                open: default_open,
                close: default_close,
            },
            5 => DayOpening::Open {
                open: default_open,
                close: default_close.min(SATURDAY_CLOSE_CAP),
            },
            _ => DayOpening::Closed,
        };
    }

    if let Some(overrides) = &settings.opening_hours {
        for (name, hours) in overrides {
            let Some(weekday) = clock::weekday_index(name) else {
                warn!("unknown weekday '{}' in opening_hours, ignoring", name);
                continue;
            };
            table[weekday] = match (&hours.open, &hours.close) {
                (Some(open), Some(close)) => {
                    let open = clock::parse_clock(open)?;
                    let close = clock::promote_end(clock::parse_clock(close)?);
                    if open >= close {
                        return Err(ScheduleError::InvalidInput(format!(
                            "opening hours for {} close before they open",
                            name
                        )));
                    }
                    DayOpening::Open { open, close }
                }
                _ => DayOpening::Closed,
            };
        }
    }
    Ok(table)
}

/// Partitions an opening interval into consecutive 30-minute slots; the last
/// slot is shortened when the interval is not a multiple of 30.
pub fn coverage_slots(open: u32, close: u32) -> Vec<(u32, u32)> {
    let mut slots = Vec::new();
    let mut start = open;
    while start < close.min(MINUTES_PER_DAY) {
        let end = (start + SLOT_MINUTES).min(close);
        slots.push((start, end));
        start = end;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayHours;
    use std::collections::HashMap;

    fn settings() -> OrganizationSettings {
        OrganizationSettings::default()
    }

    #[test]
    fn test_month_layout_feb_2026() {
        let ctx = MonthContext::new(2026, 2, None, &settings(), &[]).unwrap();
        assert_eq!(ctx.days_in_month, 28);
        // Feb 2026 starts on a Sunday
        assert_eq!(ctx.weekday(1), 6);
        assert_eq!(ctx.weekdays.len(), 20);
        assert_eq!(ctx.saturdays.len(), 4);
        assert_eq!(ctx.sundays.len(), 4);
        assert_eq!(ctx.monthly_norm_minutes, 20 * 8 * 60);
    }

    #[test]
    fn test_supplied_norm_wins() {
        let ctx = MonthContext::new(2026, 2, Some(168), &settings(), &[]).unwrap();
        assert_eq!(ctx.monthly_norm_minutes, 168 * 60);
    }

    #[test]
    fn test_rejects_bad_month_and_year() {
        assert!(MonthContext::new(2026, 13, None, &settings(), &[]).is_err());
        assert!(MonthContext::new(2026, 0, None, &settings(), &[]).is_err());
        assert!(MonthContext::new(1900, 5, None, &settings(), &[]).is_err());
    }

    #[test]
    fn test_trading_sunday_inside_month() {
        let mut s = settings();
        s.enable_trading_sundays = true;
        let trading = vec![
            TradingSunday {
                date: "2026-02-01".to_string(),
                is_active: true,
            },
            TradingSunday {
                date: "2026-02-08".to_string(),
                is_active: false,
            },
            // outside the scheduled month, ignored
            TradingSunday {
                date: "2026-03-01".to_string(),
                is_active: true,
            },
        ];
        let ctx = MonthContext::new(2026, 2, None, &s, &trading).unwrap();
        assert!(ctx.trading_sundays.contains(&1));
        assert!(!ctx.trading_sundays.contains(&8));
        assert_eq!(ctx.trading_sundays.len(), 1);
        assert!(ctx.workable_day(1));
        assert!(!ctx.workable_day(8));
    }

    #[test]
    fn test_trading_sundays_need_org_flag() {
        let trading = vec![TradingSunday {
            date: "2026-02-01".to_string(),
            is_active: true,
        }];
        let ctx = MonthContext::new(2026, 2, None, &settings(), &trading).unwrap();
        assert!(ctx.trading_sundays.is_empty());
        assert!(!ctx.workable_day(1));
    }

    #[test]
    fn test_default_opening_ladder() {
        let ctx = MonthContext::new(2026, 2, None, &settings(), &[]).unwrap();
        assert_eq!(
            ctx.opening[0],
            DayOpening::Open {
                open: 480,
                close: 1200
            }
        );
        // Saturday close is capped at 16:00
        assert_eq!(
            ctx.opening[5],
            DayOpening::Open {
                open: 480,
                close: 960
            }
        );
        assert_eq!(ctx.opening[6], DayOpening::Closed);
    }

    #[test]
    fn test_opening_override_and_closed_marker() {
        let mut s = settings();
        let mut overrides = HashMap::new();
        overrides.insert(
            "wednesday".to_string(),
            DayHours {
                open: Some("10:00".to_string()),
                close: Some("18:00".to_string()),
            },
        );
        overrides.insert("monday".to_string(), DayHours::default());
        s.opening_hours = Some(overrides);
        let ctx = MonthContext::new(2026, 2, None, &s, &[]).unwrap();
        assert_eq!(
            ctx.opening[2],
            DayOpening::Open {
                open: 600,
                close: 1080
            }
        );
        assert_eq!(ctx.opening[0], DayOpening::Closed);
    }

    #[test]
    fn test_coverage_slots() {
        let slots = coverage_slots(480, 600);
        assert_eq!(slots, vec![(480, 510), (510, 540), (540, 570), (570, 600)]);
        // non-multiple interval keeps a short tail slot
        let slots = coverage_slots(480, 525);
        assert_eq!(slots.last(), Some(&(510, 525)));
    }

    #[test]
    fn test_iso_weeks_and_blocks() {
        let ctx = MonthContext::new(2026, 2, None, &settings(), &[]).unwrap();
        let weeks = ctx.iso_weeks();
        // Feb 2026: Sun 1 ends one ISO week, then four full Mon-Sun weeks
        assert_eq!(weeks.len(), 5);
        assert_eq!(weeks[0], vec![1]);
        assert_eq!(weeks[1].len(), 7);
        let blocks = ctx.calendar_blocks();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0], vec![1, 2, 3, 4, 5, 6, 7]);
    }
}
