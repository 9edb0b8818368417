//! # SubTrack Scheduler
//!
//! The recurring-billing core: a periodic tick that auto-renews due
//! subscriptions and sends expiry reminders.
//!
//! ## Architecture
//! ```text
//! Scheduler (tokio interval, hourly)
//!   └── tick: notify-hours gate → enumerate subscriptions
//!         ├── RenewalEngine: due? → advance expiry + renew_count + audit row
//!         │     (one transaction per subscription, exclusive row lock)
//!         └── reminder window hit → dispatch to Telegram / Bark
//! ```
//!
//! Renewal is evaluated before the reminder, so a subscription renewed this
//! tick is reminded against its fresh expiry. One subscription's failure
//! never stops the others; only a failed enumeration aborts a tick.

pub mod engine;
pub mod hours;
pub mod renew;

pub use engine::{send_test_notification, Scheduler};
pub use hours::parse_notify_hours;
pub use renew::{RenewalEngine, RenewalOutcome};
