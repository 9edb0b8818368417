//! Renewal engine — the transactional state transition that advances a
//! subscription's expiry and renewal counter.
//!
//! The engine owns the decision (due-date gate, base anchoring, cycle
//! arithmetic); the storage port owns the transaction and the row lock.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use subtrack_core::error::{Result, SubtrackError};
use subtrack_core::model::RenewalRecord;
use subtrack_core::store::{RenewalPlan, SubscriptionStore};

/// Result of an auto-renew attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalOutcome {
    pub renewed: bool,
}

/// Advances subscriptions by one billing cycle at a time.
pub struct RenewalEngine {
    store: Arc<dyn SubscriptionStore>,
}

impl RenewalEngine {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Renew a subscription once if it is auto-renewing and due.
    ///
    /// A second call inside the same tick window sees the advanced expiry,
    /// fails the due-date gate, and returns `renewed: false` — renewal never
    /// double-applies.
    pub fn try_auto_renew(&self, id: i64) -> Result<RenewalOutcome> {
        self.try_auto_renew_on(id, Local::now().date_naive())
    }

    /// Clock-injected variant of [`try_auto_renew`](Self::try_auto_renew).
    pub fn try_auto_renew_on(&self, id: i64, today: NaiveDate) -> Result<RenewalOutcome> {
        let record = self.store.renew_in_tx(id, &|sub| {
            if !sub.auto_renew || sub.expire_date > today {
                return None;
            }
            // A subscription several cycles behind anchors to today and
            // advances exactly one cycle per tick — no multi-cycle
            // fast-forward.
            let base = sub.expire_date.max(today);
            Some(RenewalPlan {
                new_expire_date: sub.expire_from(base),
                new_renew_count: sub.renew_count + 1,
            })
        })?;

        if let Some(rec) = &record {
            tracing::info!(
                "🔄 Auto-renewed subscription {}: {} → {} (count {})",
                id,
                rec.old_expire_date,
                rec.new_expire_date,
                rec.renew_count
            );
        }
        Ok(RenewalOutcome {
            renewed: record.is_some(),
        })
    }

    /// Manual renewal, invoked by an external request layer. Skips the
    /// due-date gate and anchors to the current expiry: "add one more
    /// cycle", whether or not the subscription is due.
    pub fn renew(&self, id: i64) -> Result<RenewalRecord> {
        let record = self.store.renew_in_tx(id, &|sub| {
            Some(RenewalPlan {
                new_expire_date: sub.expire_from(sub.expire_date),
                new_renew_count: sub.renew_count + 1,
            })
        })?;
        let record =
            record.ok_or_else(|| SubtrackError::store("manual renewal did not commit"))?;
        tracing::info!(
            "🔄 Renewed subscription {}: {} → {} (count {})",
            id,
            record.old_expire_date,
            record.new_expire_date,
            record.renew_count
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use subtrack_core::model::{CycleUnit, Subscription};
    use subtrack_store::SqliteStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed(store: &SqliteStore, expire: NaiveDate, auto_renew: bool) -> i64 {
        store
            .insert_subscription(&Subscription {
                id: 0,
                name: "VPS".into(),
                amount: 10.0,
                currency: "USD".into(),
                start_date: date(2024, 1, 1),
                cycle_value: 1,
                cycle_unit: CycleUnit::Month,
                expire_date: expire,
                auto_renew,
                renew_count: 0,
                remind_days: 3,
                remark: String::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap()
    }

    fn engine_with_store(expire: NaiveDate, auto_renew: bool) -> (Arc<SqliteStore>, i64) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let id = seed(&store, expire, auto_renew);
        (store, id)
    }

    #[test]
    fn test_not_due_is_noop() {
        let (store, id) = engine_with_store(date(2024, 3, 15), true);
        let engine = RenewalEngine::new(store.clone());

        let outcome = engine.try_auto_renew_on(id, date(2024, 3, 14)).unwrap();
        assert!(!outcome.renewed);
        assert!(store.list_renewals(id).unwrap().is_empty());
    }

    #[test]
    fn test_due_on_expiry_day_renews_from_expiry() {
        let (store, id) = engine_with_store(date(2024, 3, 15), true);
        let engine = RenewalEngine::new(store.clone());

        let outcome = engine.try_auto_renew_on(id, date(2024, 3, 15)).unwrap();
        assert!(outcome.renewed);

        let sub = store.load_subscription(id).unwrap();
        assert_eq!(sub.expire_date, date(2024, 4, 15));
        assert_eq!(sub.renew_count, 1);
    }

    #[test]
    fn test_overdue_anchors_to_today_one_cycle() {
        // 40 days overdue: expire 2024-02-01, today 2024-03-12.
        // One cycle anchored to today, not compounded from the stale date.
        let (store, id) = engine_with_store(date(2024, 2, 1), true);
        let engine = RenewalEngine::new(store.clone());

        let outcome = engine.try_auto_renew_on(id, date(2024, 3, 12)).unwrap();
        assert!(outcome.renewed);

        let sub = store.load_subscription(id).unwrap();
        assert_eq!(sub.expire_date, date(2024, 4, 12));
        assert_eq!(sub.renew_count, 1);
    }

    #[test]
    fn test_auto_renew_disabled_is_noop() {
        let (store, id) = engine_with_store(date(2024, 2, 1), false);
        let engine = RenewalEngine::new(store.clone());

        let outcome = engine.try_auto_renew_on(id, date(2024, 3, 12)).unwrap();
        assert!(!outcome.renewed);
    }

    #[test]
    fn test_idempotent_within_tick_window() {
        let (store, id) = engine_with_store(date(2024, 3, 10), true);
        let engine = RenewalEngine::new(store.clone());
        let today = date(2024, 3, 12);

        let first = engine.try_auto_renew_on(id, today).unwrap();
        let second = engine.try_auto_renew_on(id, today).unwrap();
        assert!(first.renewed);
        assert!(!second.renewed);

        let history = store.list_renewals(id).unwrap();
        assert_eq!(history.len(), 1);
        let sub = store.load_subscription(id).unwrap();
        assert_eq!(sub.renew_count, 1);
        assert_eq!(history[0].renew_count, sub.renew_count);
    }

    #[test]
    fn test_concurrent_attempts_commit_exactly_once() {
        let (store, id) = engine_with_store(date(2024, 2, 1), true);
        let today = date(2024, 3, 12);

        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                let engine = RenewalEngine::new(store);
                engine.try_auto_renew_on(id, today).unwrap()
            }));
        }
        let renewed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| o.renewed)
            .count();

        assert_eq!(renewed, 1);
        let sub = store.load_subscription(id).unwrap();
        assert_eq!(sub.renew_count, 1);
        assert_eq!(store.list_renewals(id).unwrap().len(), 1);
    }

    #[test]
    fn test_manual_renew_skips_gate_and_anchors_to_expiry() {
        // Not due yet — manual renew still advances, from the expiry date.
        let (store, id) = engine_with_store(date(2024, 3, 15), false);
        let engine = RenewalEngine::new(store.clone());

        let record = engine.renew(id).unwrap();
        assert_eq!(record.old_expire_date, date(2024, 3, 15));
        assert_eq!(record.new_expire_date, date(2024, 4, 15));
        assert_eq!(record.renew_count, 1);

        let sub = store.load_subscription(id).unwrap();
        assert_eq!(sub.expire_date, date(2024, 4, 15));
        assert_eq!(sub.renew_count, 1);
    }

    #[test]
    fn test_zero_cycle_value_renews_one_unit() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let id = store
            .insert_subscription(&Subscription {
                id: 0,
                name: "odd".into(),
                amount: 1.0,
                currency: "CNY".into(),
                start_date: date(2024, 1, 1),
                cycle_value: 0,
                cycle_unit: CycleUnit::Month,
                expire_date: date(2024, 3, 1),
                auto_renew: true,
                renew_count: 0,
                remind_days: 3,
                remark: String::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();
        let engine = RenewalEngine::new(store.clone());

        engine.try_auto_renew_on(id, date(2024, 3, 1)).unwrap();
        let sub = store.load_subscription(id).unwrap();
        assert_eq!(sub.expire_date, date(2024, 4, 1));
    }
}
