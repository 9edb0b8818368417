//! Storage port. The renewal engine and scheduler only ever see this trait;
//! the concrete backend lives in `subtrack-store`.

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{RenewalRecord, Subscription};

/// The state transition a renewal commits: the advanced expiry and the
/// incremented counter. Produced by the engine, applied by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPlan {
    pub new_expire_date: NaiveDate,
    pub new_renew_count: i64,
}

/// Persistence capabilities the scheduler core depends on.
///
/// `renew_in_tx` is the only mutual-exclusion point in the system: the
/// implementation must load the row under an exclusive write lock, invoke
/// `decide`, and — when a plan comes back — apply the subscription update
/// and append the renewal record in the same all-or-nothing transaction.
/// Concurrent renewal attempts on one subscription serialize on that lock;
/// the second attempt observes the first's committed state.
pub trait SubscriptionStore: Send + Sync {
    /// All subscriptions, ordered by expiry.
    fn list_subscriptions(&self) -> Result<Vec<Subscription>>;

    /// A single subscription by id. `NotFound` if the row vanished.
    fn load_subscription(&self, id: i64) -> Result<Subscription>;

    /// A settings value, falling back to `default` when unset or unreadable.
    fn get_setting(&self, key: &str, default: &str) -> String;

    /// Run `decide` against the locked row. `Some(plan)` commits the update
    /// plus one appended `RenewalRecord` (returned); `None` leaves the row
    /// untouched.
    fn renew_in_tx(
        &self,
        id: i64,
        decide: &dyn Fn(&Subscription) -> Option<RenewalPlan>,
    ) -> Result<Option<RenewalRecord>>;
}
