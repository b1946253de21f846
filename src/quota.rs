//! Monthly generation quota.
//!
//! Windows are calendar months in UTC: usage resets the first time a request
//! arrives in a later month than the profile's reset date, however few days
//! have passed. Years are compared before months so December → January rolls
//! over correctly.

use chrono::{DateTime, Datelike, Utc};

use crate::models::{PlanLimits, UsageProfile};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    /// Usage after any rollover has been applied.
    pub usage: u32,
    pub allowed: bool,
    pub reset_occurred: bool,
    /// `None` for unbounded plans.
    pub limit: Option<u32>,
}

impl QuotaDecision {
    pub fn remaining(&self) -> Option<u32> {
        self.limit.map(|limit| limit.saturating_sub(self.usage))
    }
}

pub fn window_rolled_over(now: DateTime<Utc>, reset_date: DateTime<Utc>) -> bool {
    now.year() > reset_date.year()
        || (now.year() == reset_date.year() && now.month() > reset_date.month())
}

pub fn evaluate(now: DateTime<Utc>, profile: &UsageProfile, limits: &PlanLimits) -> QuotaDecision {
    let reset_occurred = window_rolled_over(now, profile.generation_reset_date);
    let usage = if reset_occurred {
        0
    } else {
        profile.generations_used
    };
    let limit = limits.allowance(profile.plan);
    let allowed = limit.map_or(true, |limit| usage < limit);

    QuotaDecision {
        usage,
        allowed,
        reset_occurred,
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Plan;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn profile(plan: Plan, used: u32, reset: DateTime<Utc>) -> UsageProfile {
        UsageProfile {
            id: "u1".to_string(),
            plan,
            generations_used: used,
            generation_reset_date: reset,
        }
    }

    #[test]
    fn later_month_resets_usage() {
        let limits = PlanLimits::STANDARD;
        for (reset, now) in [
            (at(2026, 3, 31), at(2026, 4, 1)),
            (at(2026, 1, 15), at(2026, 12, 1)),
            (at(2025, 12, 31), at(2026, 1, 1)),
            (at(2025, 6, 10), at(2026, 2, 10)),
            (at(2019, 1, 1), at(2026, 1, 1)),
        ] {
            let decision = evaluate(now, &profile(Plan::Free, 2, reset), &limits);
            assert!(decision.reset_occurred, "{reset} -> {now}");
            assert_eq!(decision.usage, 0);
            assert!(decision.allowed);
        }
    }

    #[test]
    fn same_month_keeps_usage() {
        let limits = PlanLimits::STANDARD;
        for day in 1..=28 {
            let decision = evaluate(at(2026, 2, day), &profile(Plan::Business, 7, at(2026, 2, 1)), &limits);
            assert!(!decision.reset_occurred);
            assert_eq!(decision.usage, 7);
        }
    }

    #[test]
    fn later_month_of_an_earlier_year_does_not_reset() {
        // Reset date in the future (clock skew): December 2026 vs now March 2026.
        let decision = evaluate(at(2026, 3, 1), &profile(Plan::Free, 1, at(2026, 12, 1)), &PlanLimits::STANDARD);
        assert!(!decision.reset_occurred);
        // Month number smaller but year later must still reset.
        let decision = evaluate(at(2027, 1, 1), &profile(Plan::Free, 1, at(2026, 12, 1)), &PlanLimits::STANDARD);
        assert!(decision.reset_occurred);
    }

    #[test]
    fn allowance_is_strictly_below_the_limit() {
        let limits = PlanLimits::STANDARD;
        let now = at(2026, 5, 5);
        for (plan, limit) in [(Plan::Free, 2), (Plan::Business, 15)] {
            for used in 0..limit + 3 {
                let decision = evaluate(now, &profile(plan, used, now), &limits);
                assert_eq!(decision.allowed, used < limit, "{plan} used={used}");
                assert_eq!(decision.limit, Some(limit));
            }
        }
    }

    #[test]
    fn agency_is_unbounded() {
        let now = at(2026, 5, 5);
        for used in [0, 15, 1_000, u32::MAX] {
            let decision = evaluate(now, &profile(Plan::Agency, used, now), &PlanLimits::STANDARD);
            assert!(decision.allowed);
            assert_eq!(decision.limit, None);
            assert_eq!(decision.remaining(), None);
        }
    }

    #[test]
    fn evaluate_is_idempotent() {
        let p = profile(Plan::Free, 1, at(2026, 1, 20));
        let now = at(2026, 3, 2);
        assert_eq!(
            evaluate(now, &p, &PlanLimits::STANDARD),
            evaluate(now, &p, &PlanLimits::STANDARD)
        );
    }

    #[test]
    fn remaining_saturates() {
        let now = at(2026, 5, 5);
        let decision = evaluate(now, &profile(Plan::Free, 5, now), &PlanLimits::STANDARD);
        assert_eq!(decision.remaining(), Some(0));
    }
}
