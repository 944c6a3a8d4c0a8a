//! Working-day calendars for SLA arithmetic.
//!
//! SLA budgets count working days against a per-authority calendar: a set
//! of non-working weekdays plus an explicit holiday list. The calendar walk
//! moves day by day, skipping non-working days until the budget is
//! exhausted — a 3-day budget that crosses one holiday lands 4 calendar
//! days out.

#![deny(unsafe_code)]

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use seva_types::AuthorityId;
use std::collections::{HashMap, HashSet};

/// A working-day calendar for one authority.
#[derive(Clone, Debug)]
pub struct WorkingCalendar {
    non_working_weekdays: HashSet<Weekday>,
    holidays: HashSet<NaiveDate>,
}

impl WorkingCalendar {
    /// A calendar with no non-working days at all.
    pub fn always_open() -> Self {
        Self {
            non_working_weekdays: HashSet::new(),
            holidays: HashSet::new(),
        }
    }

    /// The common government calendar: Sundays off.
    pub fn sundays_off() -> Self {
        let mut cal = Self::always_open();
        cal.non_working_weekdays.insert(Weekday::Sun);
        cal
    }

    /// Saturday and Sunday off.
    pub fn weekends_off() -> Self {
        let mut cal = Self::sundays_off();
        cal.non_working_weekdays.insert(Weekday::Sat);
        cal
    }

    pub fn with_holiday(mut self, date: NaiveDate) -> Self {
        self.holidays.insert(date);
        self
    }

    pub fn with_non_working_weekday(mut self, weekday: Weekday) -> Self {
        self.non_working_weekdays.insert(weekday);
        self
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !self.non_working_weekdays.contains(&date.weekday()) && !self.holidays.contains(&date)
    }

    /// Walk forward `days` working days from `from`.
    ///
    /// The starting day itself does not consume budget; each subsequent
    /// working day consumes one.
    pub fn add_working_days(&self, from: DateTime<Utc>, days: u32) -> DateTime<Utc> {
        let mut cursor = from;
        let mut remaining = days;
        while remaining > 0 {
            cursor += Duration::days(1);
            if self.is_working_day(cursor.date_naive()) {
                remaining -= 1;
            }
        }
        cursor
    }

    /// Align an instant forward onto a working day, preserving time of day.
    pub fn next_working_instant(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let mut cursor = from;
        while !self.is_working_day(cursor.date_naive()) {
            cursor += Duration::days(1);
        }
        cursor
    }

    /// Re-add a frozen SLA remainder from a resumption instant.
    pub fn add_remaining(
        &self,
        from: DateTime<Utc>,
        remaining: Duration,
        rule: CarryRule,
    ) -> DateTime<Utc> {
        let start = self.next_working_instant(from);
        match rule {
            CarryRule::ExactSeconds => {
                // Whole days walk the calendar; the sub-day remainder is
                // carried as-is.
                let whole_days = remaining.num_days().max(0) as u32;
                let leftover = remaining - Duration::days(whole_days as i64);
                self.add_working_days(start, whole_days) + leftover
            }
            CarryRule::RoundUpToDay => {
                let secs = remaining.num_seconds().max(0);
                let days = (secs as u64).div_ceil(86_400) as u32;
                self.add_working_days(start, days)
            }
        }
    }
}

impl Default for WorkingCalendar {
    fn default() -> Self {
        Self::sundays_off()
    }
}

/// How a paused SLA remainder is carried forward on resume.
///
/// The pause/resume arithmetic is policy, not a single canonical formula;
/// both rules are covered by unit tests and chosen per authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarryRule {
    /// Re-add the exact frozen remainder (whole days walk the calendar,
    /// the sub-day part is carried verbatim).
    ExactSeconds,
    /// Round the remainder up to whole working days.
    RoundUpToDay,
}

impl Default for CarryRule {
    fn default() -> Self {
        Self::ExactSeconds
    }
}

/// Calendars per authority, with a shared default.
#[derive(Clone, Debug, Default)]
pub struct CalendarBook {
    calendars: HashMap<AuthorityId, WorkingCalendar>,
    default: WorkingCalendar,
}

impl CalendarBook {
    pub fn new(default: WorkingCalendar) -> Self {
        Self {
            calendars: HashMap::new(),
            default,
        }
    }

    pub fn insert(&mut self, authority: AuthorityId, calendar: WorkingCalendar) {
        self.calendars.insert(authority, calendar);
    }

    pub fn for_authority(&self, authority: &AuthorityId) -> &WorkingCalendar {
        self.calendars.get(authority).unwrap_or(&self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn working_day_checks() {
        // 2026-08-02 is a Sunday.
        let cal = WorkingCalendar::sundays_off().with_holiday(date(2026, 8, 15));
        assert!(!cal.is_working_day(date(2026, 8, 2)));
        assert!(cal.is_working_day(date(2026, 8, 3)));
        assert!(!cal.is_working_day(date(2026, 8, 15)));
    }

    #[test]
    fn three_day_budget_across_one_holiday_lands_four_days_out() {
        // Monday 2026-08-03 start; Tuesday 2026-08-04 is a holiday.
        let cal = WorkingCalendar::always_open().with_holiday(date(2026, 8, 4));
        let due = cal.add_working_days(utc(2026, 8, 3), 3);
        assert_eq!(due, utc(2026, 8, 7));
    }

    #[test]
    fn plain_budget_has_no_skips() {
        let cal = WorkingCalendar::always_open();
        let due = cal.add_working_days(utc(2026, 8, 3), 3);
        assert_eq!(due, utc(2026, 8, 6));
    }

    #[test]
    fn sundays_are_skipped() {
        // Friday 2026-08-07 + 2 working days skips Sunday 08-09.
        let cal = WorkingCalendar::sundays_off();
        let due = cal.add_working_days(utc(2026, 8, 7), 2);
        assert_eq!(due, utc(2026, 8, 10));
    }

    #[test]
    fn consecutive_non_working_days_all_skip() {
        let cal = WorkingCalendar::weekends_off().with_holiday(date(2026, 8, 10));
        // Friday 08-07 + 1 working day: skip Sat 08, Sun 09, holiday Mon 10.
        let due = cal.add_working_days(utc(2026, 8, 7), 1);
        assert_eq!(due, utc(2026, 8, 11));
    }

    #[test]
    fn next_working_instant_aligns_forward() {
        let cal = WorkingCalendar::sundays_off();
        // Sunday 2026-08-02 aligns to Monday, same time of day.
        assert_eq!(cal.next_working_instant(utc(2026, 8, 2)), utc(2026, 8, 3));
        // A working day is returned untouched.
        assert_eq!(cal.next_working_instant(utc(2026, 8, 3)), utc(2026, 8, 3));
    }

    #[test]
    fn exact_seconds_carry() {
        let cal = WorkingCalendar::always_open();
        let remaining = Duration::days(1) + Duration::hours(6);
        let due = cal.add_remaining(utc(2026, 8, 3), remaining, CarryRule::ExactSeconds);
        assert_eq!(due, utc(2026, 8, 4) + Duration::hours(6));
    }

    #[test]
    fn exact_seconds_carry_skips_holidays_for_whole_days() {
        let cal = WorkingCalendar::always_open().with_holiday(date(2026, 8, 4));
        let remaining = Duration::days(1) + Duration::hours(2);
        let due = cal.add_remaining(utc(2026, 8, 3), remaining, CarryRule::ExactSeconds);
        // The whole day skips the holiday; the 2h remainder rides along.
        assert_eq!(due, utc(2026, 8, 5) + Duration::hours(2));
    }

    #[test]
    fn round_up_carry() {
        let cal = WorkingCalendar::always_open();
        let remaining = Duration::hours(30);
        let due = cal.add_remaining(utc(2026, 8, 3), remaining, CarryRule::RoundUpToDay);
        assert_eq!(due, utc(2026, 8, 5));
    }

    #[test]
    fn resume_on_non_working_day_aligns_first() {
        let cal = WorkingCalendar::sundays_off();
        // Resuming on Sunday 08-02 aligns to Monday before the walk.
        let due = cal.add_remaining(
            utc(2026, 8, 2),
            Duration::days(1),
            CarryRule::ExactSeconds,
        );
        assert_eq!(due, utc(2026, 8, 4));
    }

    #[test]
    fn calendar_book_falls_back_to_default() {
        let mut book = CalendarBook::new(WorkingCalendar::sundays_off());
        book.insert(
            AuthorityId::new("DIST-01"),
            WorkingCalendar::weekends_off(),
        );

        assert!(!book
            .for_authority(&AuthorityId::new("DIST-01"))
            .is_working_day(date(2026, 8, 1))); // Saturday
        assert!(book
            .for_authority(&AuthorityId::new("DIST-02"))
            .is_working_day(date(2026, 8, 1)));
    }
}
