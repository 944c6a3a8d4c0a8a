//! SLA clock operations on applications.
//!
//! The clock has three verbs: start (entering a stage with an SLA budget),
//! pause (a query freezes the remaining budget), and resume (resubmission
//! re-adds the frozen remainder from the resumption instant — never the
//! full original duration).

use chrono::{DateTime, Duration, Utc};
use seva_calendar::{CarryRule, WorkingCalendar};
use seva_types::Application;

/// SLA arithmetic bound to one authority's calendar.
pub struct SlaClock<'a> {
    calendar: &'a WorkingCalendar,
    carry_rule: CarryRule,
}

impl<'a> SlaClock<'a> {
    pub fn new(calendar: &'a WorkingCalendar, carry_rule: CarryRule) -> Self {
        Self {
            calendar,
            carry_rule,
        }
    }

    /// Start the stage clock: `due = now + sla_days` in working days.
    /// A stage without a budget clears the deadline.
    pub fn start(&self, app: &mut Application, sla_days: Option<u32>, now: DateTime<Utc>) {
        app.sla_due_at = sla_days.map(|days| self.calendar.add_working_days(now, days));
        app.sla_paused_at = None;
        app.sla_remaining_secs = None;
    }

    /// Freeze the remaining budget. A clock with no deadline or one
    /// already paused is left untouched.
    pub fn pause(&self, app: &mut Application, now: DateTime<Utc>) {
        if app.sla_paused_at.is_some() {
            return;
        }
        let Some(due) = app.sla_due_at else {
            return;
        };

        let remaining = (due - now).max(Duration::zero());
        app.sla_paused_at = Some(now);
        app.sla_remaining_secs = Some(remaining.num_seconds());
        tracing::debug!(
            arn = %app.arn,
            remaining_secs = remaining.num_seconds(),
            "sla paused"
        );
    }

    /// Resume from the frozen remainder, recalculating the deadline
    /// forward from `now`.
    pub fn resume(&self, app: &mut Application, now: DateTime<Utc>) {
        let Some(remaining_secs) = app.sla_remaining_secs.take() else {
            app.sla_paused_at = None;
            return;
        };

        let remaining = Duration::seconds(remaining_secs.max(0));
        app.sla_due_at = Some(self.calendar.add_remaining(now, remaining, self.carry_rule));
        app.sla_paused_at = None;
        tracing::debug!(arn = %app.arn, due = ?app.sla_due_at, "sla resumed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use seva_types::{Arn, AuthorityId, ServiceKey, StateId};

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, d, h, 0, 0).unwrap()
    }

    fn app() -> Application {
        Application::submit(
            Arn::new("ARN-1"),
            ServiceKey::new("water_connection"),
            1,
            AuthorityId::new("DIST-01"),
            StateId::new("CLERK_REVIEW"),
            serde_json::json!({}),
        )
    }

    #[test]
    fn start_sets_deadline_in_working_days() {
        let calendar = WorkingCalendar::always_open();
        let clock = SlaClock::new(&calendar, CarryRule::ExactSeconds);
        let mut app = app();

        clock.start(&mut app, Some(3), utc(3, 10));
        assert_eq!(app.sla_due_at, Some(utc(6, 10)));

        clock.start(&mut app, None, utc(3, 10));
        assert!(app.sla_due_at.is_none());
    }

    #[test]
    fn pause_freezes_the_remainder() {
        let calendar = WorkingCalendar::always_open();
        let clock = SlaClock::new(&calendar, CarryRule::ExactSeconds);
        let mut app = app();

        clock.start(&mut app, Some(3), utc(3, 10));
        clock.pause(&mut app, utc(4, 10));

        assert!(app.sla_paused());
        assert_eq!(app.sla_remaining_secs, Some(2 * 86_400));
    }

    #[test]
    fn resume_carries_the_remainder_not_the_original_budget() {
        let calendar = WorkingCalendar::always_open();
        let clock = SlaClock::new(&calendar, CarryRule::ExactSeconds);
        let mut app = app();

        // 3-day budget, one day consumed, then a 5-day pause.
        clock.start(&mut app, Some(3), utc(3, 10));
        clock.pause(&mut app, utc(4, 10));
        clock.resume(&mut app, utc(9, 10));

        // Two days remained; due is resume + 2 days, not resume + 3.
        assert_eq!(app.sla_due_at, Some(utc(11, 10)));
        assert!(!app.sla_paused());
        assert!(app.sla_remaining_secs.is_none());
    }

    #[test]
    fn overrun_budget_resumes_immediately_due() {
        let calendar = WorkingCalendar::always_open();
        let clock = SlaClock::new(&calendar, CarryRule::ExactSeconds);
        let mut app = app();

        // Paused after the deadline already passed: remainder clamps to 0.
        clock.start(&mut app, Some(1), utc(3, 10));
        clock.pause(&mut app, utc(6, 10));
        assert_eq!(app.sla_remaining_secs, Some(0));

        clock.resume(&mut app, utc(9, 10));
        assert_eq!(app.sla_due_at, Some(utc(9, 10)));
    }

    #[test]
    fn double_pause_is_a_no_op() {
        let calendar = WorkingCalendar::always_open();
        let clock = SlaClock::new(&calendar, CarryRule::ExactSeconds);
        let mut app = app();

        clock.start(&mut app, Some(3), utc(3, 10));
        clock.pause(&mut app, utc(4, 10));
        let frozen = app.sla_remaining_secs;

        clock.pause(&mut app, utc(5, 10));
        assert_eq!(app.sla_remaining_secs, frozen);
        assert_eq!(app.sla_paused_at, Some(utc(4, 10)));
    }

    #[test]
    fn round_up_rule_snaps_to_whole_days() {
        let calendar = WorkingCalendar::always_open();
        let clock = SlaClock::new(&calendar, CarryRule::RoundUpToDay);
        let mut app = app();

        clock.start(&mut app, Some(3), utc(3, 10));
        // 1.5 days consumed; 1.5 days remain.
        clock.pause(&mut app, utc(4, 22));
        clock.resume(&mut app, utc(9, 10));

        // Rounded up to 2 whole working days.
        assert_eq!(app.sla_due_at, Some(utc(11, 10)));
    }

    #[test]
    fn resume_across_holidays_walks_the_calendar() {
        let calendar = WorkingCalendar::always_open()
            .with_holiday(chrono::NaiveDate::from_ymd_opt(2026, 8, 10).unwrap());
        let clock = SlaClock::new(&calendar, CarryRule::ExactSeconds);
        let mut app = app();

        clock.start(&mut app, Some(3), utc(3, 10));
        clock.pause(&mut app, utc(4, 10)); // 2 days remain
        clock.resume(&mut app, utc(9, 10));

        // The walk skips the 08-10 holiday: 09 → 11, not 09 → 11 minus one.
        assert_eq!(app.sla_due_at, Some(utc(12, 10)));
    }
}
