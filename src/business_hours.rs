//! # Business Hours Module
//!
//! Weekly opening schedule and the open/closed oracle consulted on every turn.
//!
//! Weekdays are numbered from Sunday (`0`) to Saturday (`6`). Each day either has a
//! half-open `[open, close)` interval in minutes of the local day or is closed.
//! Overnight intervals (close before open) are rejected at parse time.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, TimeZone, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref DAY_RULE: Regex =
        Regex::new(r"^\s*(\d)(?:\s*-\s*(\d))?\s*=\s*(?:(closed|fechado)|(\d{1,2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2}))\s*$")
            .expect("Business hours rule pattern should be valid");
}

/// Opening interval of a single day, in minutes since local midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayHours {
    pub open_minute: u16,
    pub close_minute: u16,
}

impl DayHours {
    /// Build from `HH:MM` components; `None` when the interval is empty or wraps midnight
    pub fn new(open_hour: u16, open_min: u16, close_hour: u16, close_min: u16) -> Option<Self> {
        if open_hour > 23 || close_hour > 24 || open_min > 59 || close_min > 59 {
            return None;
        }
        let open_minute = open_hour * 60 + open_min;
        let close_minute = close_hour * 60 + close_min;
        if open_minute >= close_minute || close_minute > 24 * 60 {
            return None;
        }
        Some(Self {
            open_minute,
            close_minute,
        })
    }

    pub fn contains(&self, minute_of_day: u16) -> bool {
        self.open_minute <= minute_of_day && minute_of_day < self.close_minute
    }
}

impl fmt::Display for DayHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02} às {:02}:{:02}",
            self.open_minute / 60,
            self.open_minute % 60,
            self.close_minute / 60,
            self.close_minute % 60
        )
    }
}

/// Per-weekday schedule, index 0 is Sunday
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: [Option<DayHours>; 7],
}

impl WeeklySchedule {
    pub fn new(days: [Option<DayHours>; 7]) -> Self {
        Self { days }
    }

    /// Parse rules such as `1-5=09:00-18:00;6=09:00-13:00;0=closed`
    ///
    /// Days without a rule are closed.
    pub fn parse(text: &str) -> Result<Self> {
        let mut days = [None; 7];

        for rule in text.split(';').filter(|r| !r.trim().is_empty()) {
            let caps = DAY_RULE
                .captures(rule)
                .with_context(|| format!("Invalid business hours rule: '{rule}'"))?;

            let first: usize = caps[1].parse()?;
            let last: usize = match caps.get(2) {
                Some(m) => m.as_str().parse()?,
                None => first,
            };
            if first > 6 || last > 6 || first > last {
                bail!("Invalid weekday range in business hours rule: '{rule}'");
            }

            let hours = if caps.get(3).is_some() {
                None
            } else {
                let hours = DayHours::new(
                    caps[4].parse()?,
                    caps[5].parse()?,
                    caps[6].parse()?,
                    caps[7].parse()?,
                )
                .with_context(|| format!("Opening must be before closing in rule: '{rule}'"))?;
                Some(hours)
            };

            for day in days.iter_mut().take(last + 1).skip(first) {
                *day = hours;
            }
        }

        Ok(Self { days })
    }

    pub fn day(&self, weekday: u32) -> Option<DayHours> {
        self.days.get(weekday as usize).copied().flatten()
    }

    /// `(weekday, hours)` pairs from Sunday to Saturday
    pub fn entries(&self) -> impl Iterator<Item = (u32, Option<DayHours>)> + '_ {
        self.days.iter().enumerate().map(|(i, d)| (i as u32, *d))
    }

    /// Whether the shop is open on `weekday` at `minute_of_day`
    pub fn is_open(&self, weekday: u32, minute_of_day: u16) -> bool {
        self.day(weekday)
            .map(|hours| hours.contains(minute_of_day))
            .unwrap_or(false)
    }

    /// Evaluate the schedule at a moment already expressed in the shop's local time zone
    pub fn is_open_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let weekday = now.weekday().num_days_from_sunday();
        let minute_of_day = (now.hour() * 60 + now.minute()) as u16;
        self.is_open(weekday, minute_of_day)
    }
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        let weekday = DayHours::new(9, 0, 18, 0);
        let saturday = DayHours::new(9, 0, 13, 0);
        Self {
            days: [None, weekday, weekday, weekday, weekday, weekday, saturday],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        // 2026-10-11 is a Sunday
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        offset
            .with_ymd_and_hms(2026, 10, 11 + day, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_default_schedule_boundaries() {
        let schedule = WeeklySchedule::default();

        assert!(!schedule.is_open_at(&at(0, 10, 0)));
        assert!(!schedule.is_open_at(&at(0, 0, 0)));
        assert!(schedule.is_open_at(&at(3, 9, 0)));
        assert!(!schedule.is_open_at(&at(3, 8, 59)));
        assert!(!schedule.is_open_at(&at(3, 18, 0)));
        assert!(schedule.is_open_at(&at(3, 17, 59)));
        assert!(schedule.is_open_at(&at(6, 12, 59)));
        assert!(!schedule.is_open_at(&at(6, 13, 0)));
    }

    #[test]
    fn test_parse_rules() {
        let schedule = WeeklySchedule::parse("1-5=09:00-18:00;6=09:00-13:00;0=closed").unwrap();
        assert_eq!(schedule, WeeklySchedule::default());

        let schedule = WeeklySchedule::parse("2=08:30-12:15").unwrap();
        assert!(schedule.is_open(2, 8 * 60 + 30));
        assert!(!schedule.is_open(2, 12 * 60 + 15));
        assert!(!schedule.is_open(1, 10 * 60));
    }

    #[test]
    fn test_parse_rejects_overnight_and_garbage() {
        assert!(WeeklySchedule::parse("5=22:00-02:00").is_err());
        assert!(WeeklySchedule::parse("0=09:00-00:00").is_err());
        assert!(WeeklySchedule::parse("8=09:00-10:00").is_err());
        assert!(WeeklySchedule::parse("5-1=09:00-10:00").is_err());
        assert!(WeeklySchedule::parse("weekdays").is_err());
    }

    #[test]
    fn test_day_hours_display() {
        let hours = DayHours::new(9, 0, 13, 30).unwrap();
        assert_eq!(hours.to_string(), "09:00 às 13:30");
    }
}
