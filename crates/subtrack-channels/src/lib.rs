//! # SubTrack Channels
//!
//! Outbound notification transports. Each send is one HTTP call with its own
//! timeout; the dispatcher fans a rendered message out to every configured
//! channel and collects per-channel results without aborting siblings.

pub mod dispatch;
pub mod message;

pub use dispatch::{dispatch, dispatch_all, targets_from_settings, NotifyTarget};
pub use message::{reminder_message, test_message};
