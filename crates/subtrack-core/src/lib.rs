//! # SubTrack Core
//!
//! Shared foundation for the SubTrack workspace: the subscription data
//! model, billing-cycle arithmetic, the reminder-window policy, the error
//! taxonomy, and the storage port the renewal engine runs against.

pub mod error;
pub mod model;
pub mod store;

pub use error::{Result, SubtrackError};
pub use model::{next_expiry, CycleUnit, RenewalRecord, Subscription};
pub use store::{RenewalPlan, SubscriptionStore};
