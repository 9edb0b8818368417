//! Subscription data model and the pure date rules built on it:
//! billing-cycle arithmetic and the reminder-window predicate.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Billing cycle granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleUnit {
    Day,
    #[default]
    Month,
    Quarter,
    HalfYear,
    Year,
}

impl CycleUnit {
    /// Parse from the stored text form. Unknown or empty input falls back
    /// to the month rule.
    pub fn parse(s: &str) -> Self {
        match s {
            "day" => Self::Day,
            "quarter" => Self::Quarter,
            "half_year" => Self::HalfYear,
            "year" => Self::Year,
            _ => Self::Month,
        }
    }

    /// The stored text form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::HalfYear => "half_year",
            Self::Year => "year",
        }
    }
}

/// Compute the expiry date one billing period of `count` units after `base`.
///
/// Month-based units use calendar month arithmetic with day-of-month clamping
/// (Jan 31 + 1 month = last day of Feb). Callers are responsible for
/// normalizing a non-positive count before calling.
pub fn next_expiry(base: NaiveDate, unit: CycleUnit, count: u32) -> NaiveDate {
    let months = |n: u32| base.checked_add_months(Months::new(n)).unwrap_or(base);
    match unit {
        CycleUnit::Day => base
            .checked_add_signed(Duration::days(count as i64))
            .unwrap_or(base),
        CycleUnit::Month => months(count),
        CycleUnit::Quarter => months(count * 3),
        CycleUnit::HalfYear => months(count * 6),
        CycleUnit::Year => months(count * 12),
    }
}

/// A tracked subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Row id (0 until inserted).
    pub id: i64,
    pub name: String,
    pub amount: f64,
    pub currency: String,
    /// Date billing began.
    pub start_date: NaiveDate,
    /// Positive count of cycle units per billing period.
    pub cycle_value: i64,
    pub cycle_unit: CycleUnit,
    /// Date the current billing period ends.
    pub expire_date: NaiveDate,
    /// When true, the renewal engine advances `expire_date` once it has passed.
    pub auto_renew: bool,
    /// Incremented exactly once per successful renewal.
    pub renew_count: i64,
    /// Days before expiration during which a reminder fires.
    pub remind_days: i64,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Expiry one billing period after `base`, with a non-positive
    /// `cycle_value` treated as 1.
    pub fn expire_from(&self, base: NaiveDate) -> NaiveDate {
        next_expiry(base, self.cycle_unit, self.cycle_value.max(1) as u32)
    }

    /// Expiry of the first billing period, counted from `start_date`.
    /// Used when a new record is created without an explicit expire date.
    pub fn initial_expiry(&self) -> NaiveDate {
        self.expire_from(self.start_date)
    }

    /// Whether `today` falls inside the reminder window
    /// `[expire_date - remind_days, expire_date]`, inclusive on both ends.
    pub fn should_remind_on(&self, today: NaiveDate) -> bool {
        let remind_date = self.expire_date - Duration::days(self.remind_days);
        today >= remind_date && today <= self.expire_date
    }

    /// Whole days from `today` until expiry. Negative once expired.
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expire_date - today).num_days()
    }
}

/// One immutable row per successful renewal — the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalRecord {
    pub id: i64,
    pub subscription_id: i64,
    pub renewed_at: DateTime<Utc>,
    pub old_expire_date: NaiveDate,
    pub new_expire_date: NaiveDate,
    /// The subscription's renew_count after this renewal. The latest
    /// record always matches the subscription row.
    pub renew_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sub(expire: NaiveDate, remind_days: i64) -> Subscription {
        Subscription {
            id: 1,
            name: "iCloud".into(),
            amount: 6.0,
            currency: "CNY".into(),
            start_date: date(2024, 1, 1),
            cycle_value: 1,
            cycle_unit: CycleUnit::Month,
            expire_date: expire,
            auto_renew: false,
            renew_count: 0,
            remind_days,
            remark: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_next_expiry_day() {
        assert_eq!(
            next_expiry(date(2024, 3, 1), CycleUnit::Day, 10),
            date(2024, 3, 11)
        );
    }

    #[test]
    fn test_next_expiry_month_clamps_end_of_month() {
        // Leap-year end-of-month clamp
        assert_eq!(
            next_expiry(date(2024, 1, 31), CycleUnit::Month, 1),
            date(2024, 2, 29)
        );
        assert_eq!(
            next_expiry(date(2023, 1, 31), CycleUnit::Month, 1),
            date(2023, 2, 28)
        );
    }

    #[test]
    fn test_next_expiry_quarter_half_year_year() {
        let base = date(2024, 1, 15);
        assert_eq!(next_expiry(base, CycleUnit::Quarter, 1), date(2024, 4, 15));
        assert_eq!(next_expiry(base, CycleUnit::HalfYear, 1), date(2024, 7, 15));
        assert_eq!(next_expiry(base, CycleUnit::Year, 2), date(2026, 1, 15));
    }

    #[test]
    fn test_next_expiry_monotonic_in_count() {
        let base = date(2024, 1, 31);
        for unit in [
            CycleUnit::Day,
            CycleUnit::Month,
            CycleUnit::Quarter,
            CycleUnit::HalfYear,
            CycleUnit::Year,
        ] {
            let mut prev = base;
            for count in 1..=24 {
                let next = next_expiry(base, unit, count);
                assert!(next > prev, "{unit:?} count {count} not increasing");
                prev = next;
            }
        }
    }

    #[test]
    fn test_cycle_unit_parse_defaults_to_month() {
        assert_eq!(CycleUnit::parse("day"), CycleUnit::Day);
        assert_eq!(CycleUnit::parse("half_year"), CycleUnit::HalfYear);
        assert_eq!(CycleUnit::parse("weekly"), CycleUnit::Month);
        assert_eq!(CycleUnit::parse(""), CycleUnit::Month);
    }

    #[test]
    fn test_reminder_window_inclusive() {
        let s = sub(date(2024, 3, 10), 3);
        assert!(!s.should_remind_on(date(2024, 3, 6)));
        assert!(s.should_remind_on(date(2024, 3, 7))); // window start
        assert!(s.should_remind_on(date(2024, 3, 8)));
        assert!(s.should_remind_on(date(2024, 3, 10))); // expiry itself
        assert!(!s.should_remind_on(date(2024, 3, 11))); // past expiry
    }

    #[test]
    fn test_reminder_window_zero_days() {
        let s = sub(date(2024, 3, 10), 0);
        assert!(!s.should_remind_on(date(2024, 3, 9)));
        assert!(s.should_remind_on(date(2024, 3, 10)));
    }

    #[test]
    fn test_days_until_expiry_can_go_negative() {
        let s = sub(date(2024, 3, 10), 3);
        assert_eq!(s.days_until_expiry(date(2024, 3, 8)), 2);
        assert_eq!(s.days_until_expiry(date(2024, 3, 12)), -2);
    }

    #[test]
    fn test_expire_from_normalizes_cycle_value() {
        let mut s = sub(date(2024, 3, 10), 3);
        s.cycle_value = 0;
        assert_eq!(s.expire_from(date(2024, 3, 10)), date(2024, 4, 10));
    }
}
