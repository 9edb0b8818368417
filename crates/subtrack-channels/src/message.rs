//! Message rendering for subscription notifications.

use chrono::NaiveDate;

use subtrack_core::model::Subscription;

/// Render the scheduled expiry reminder: `(title, body)`.
pub fn reminder_message(sub: &Subscription, today: NaiveDate) -> (String, String) {
    let title = "📢 Subscription expiry reminder".to_string();
    let body = format!(
        "Name: {}\nAmount: {:.2} {}\nExpires: {}\nDays left: {}",
        sub.name,
        sub.amount,
        sub.currency,
        sub.expire_date.format("%Y-%m-%d"),
        sub.days_until_expiry(today),
    );
    (title, body)
}

/// Render the interactive "test notify" message: `(title, body)`.
pub fn test_message(sub: &Subscription) -> (String, String) {
    let title = "📋 SubTrack notification test".to_string();
    let body = format!(
        "Name: {}\nAmount: {:.2} {}\nStarted: {}\nExpires: {}\nRemark: {}",
        sub.name,
        sub.amount,
        sub.currency,
        sub.start_date.format("%Y-%m-%d"),
        sub.expire_date.format("%Y-%m-%d"),
        sub.remark,
    );
    (title, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use subtrack_core::model::CycleUnit;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sub() -> Subscription {
        Subscription {
            id: 1,
            name: "Netflix".into(),
            amount: 68.0,
            currency: "CNY".into(),
            start_date: date(2024, 1, 1),
            cycle_value: 1,
            cycle_unit: CycleUnit::Month,
            expire_date: date(2024, 3, 10),
            auto_renew: false,
            renew_count: 0,
            remind_days: 3,
            remark: "family plan".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_reminder_message_fields() {
        let (title, body) = reminder_message(&sub(), date(2024, 3, 8));
        assert!(title.contains("reminder"));
        assert!(body.contains("Netflix"));
        assert!(body.contains("68.00 CNY"));
        assert!(body.contains("2024-03-10"));
        assert!(body.contains("Days left: 2"));
    }

    #[test]
    fn test_reminder_message_negative_days() {
        let (_, body) = reminder_message(&sub(), date(2024, 3, 12));
        assert!(body.contains("Days left: -2"));
    }

    #[test]
    fn test_test_message_fields() {
        let (title, body) = test_message(&sub());
        assert!(title.contains("test"));
        assert!(body.contains("Started: 2024-01-01"));
        assert!(body.contains("Remark: family plan"));
    }
}
