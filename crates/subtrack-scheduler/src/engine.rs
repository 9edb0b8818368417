//! Tick scheduler — the periodic driver that checks and acts on
//! subscriptions. One tokio task, one tick at a time, never overlapping.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use subtrack_channels::{dispatch_all, reminder_message, targets_from_settings, test_message};
use subtrack_core::error::{Result, SubtrackError};
use subtrack_core::store::SubscriptionStore;

use crate::hours::parse_notify_hours;
use crate::renew::RenewalEngine;

/// The periodic scheduler. `start` spawns the tick loop; `stop` prevents new
/// ticks and waits for an in-progress one to finish.
pub struct Scheduler {
    store: Arc<dyn SubscriptionStore>,
    check_interval: Duration,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn SubscriptionStore>, check_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            check_interval,
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the scheduler loop as a background tokio task.
    pub fn start(&self) {
        let mut guard = match self.handle.lock() {
            Ok(g) => g,
            Err(e) => {
                tracing::error!("❌ Scheduler handle lock poisoned: {e}");
                return;
            }
        };
        if guard.is_some() {
            tracing::warn!("⚠️ Scheduler already running");
            return;
        }

        let store = self.store.clone();
        let check_interval = self.check_interval;
        let mut shutdown_rx = self.shutdown.subscribe();

        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            // A tick that overran its period is not replayed
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_tick_at(&store, Local::now()).await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            tracing::info!("⏹️ Scheduler stopped");
        }));
        tracing::info!(
            "⏰ Scheduler started (check every {}s)",
            check_interval.as_secs()
        );
    }

    /// Graceful stop: no new tick starts; a running tick completes first.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.handle.lock().ok().and_then(|mut g| g.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// Execute one tick against the wall-clock time `now`.
///
/// Outside the configured notify hours the tick is a no-op. Inside them,
/// every subscription is processed independently: auto-renew first (so the
/// reminder sees the fresh expiry), then the reminder window. Per-item
/// failures are logged and swallowed; only a failed enumeration aborts the
/// tick.
pub async fn run_tick_at(store: &Arc<dyn SubscriptionStore>, now: DateTime<Local>) {
    let hours = parse_notify_hours(&store.get_setting("notify_hours", "9"));
    if !hours.contains(&now.hour()) {
        tracing::debug!("Outside notify hours ({:?}), skipping tick", hours);
        return;
    }
    let today = now.date_naive();

    let subscriptions = match store.list_subscriptions() {
        Ok(subs) => subs,
        Err(e) => {
            tracing::error!("❌ Failed to list subscriptions: {e}");
            return;
        }
    };

    let engine = RenewalEngine::new(store.clone());
    let targets = targets_from_settings(store.as_ref());

    for mut sub in subscriptions {
        if sub.auto_renew {
            match engine.try_auto_renew_on(sub.id, today) {
                Ok(outcome) if outcome.renewed => {
                    // Expiry changed; evaluate the reminder on the fresh row
                    match store.load_subscription(sub.id) {
                        Ok(fresh) => sub = fresh,
                        Err(e) => {
                            tracing::warn!(
                                "⚠️ Subscription {} gone after renewal: {e}",
                                sub.id
                            );
                            continue;
                        }
                    }
                }
                Ok(_) => {}
                Err(SubtrackError::NotFound(_)) => {
                    tracing::warn!("⚠️ Subscription '{}' ({}) vanished, skipping", sub.name, sub.id);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Auto-renew failed for '{}' ({}): {e}", sub.name, sub.id);
                }
            }
        }

        if sub.should_remind_on(today) {
            let (title, body) = reminder_message(&sub, today);
            // Per-channel results are logged inside dispatch_all; a failed
            // send is dropped and retried naturally on a later tick while
            // the reminder window still holds.
            let _ = dispatch_all(&targets, &title, &body).await;
        }
    }
}

/// Send a test notification for one subscription through every configured
/// channel. Zero successful sends is an error; partial success is success.
pub async fn send_test_notification(store: &dyn SubscriptionStore, id: i64) -> Result<()> {
    let sub = store.load_subscription(id)?;
    let targets = targets_from_settings(store);
    if targets.is_empty() {
        return Err(SubtrackError::notify("no notification channel configured"));
    }

    let (title, body) = test_message(&sub);
    let results = dispatch_all(&targets, &title, &body).await;

    let mut errors = Vec::new();
    let mut sent = false;
    for (name, result) in results {
        match result {
            Ok(()) => sent = true,
            Err(e) => errors.push(format!("{name}: {e}")),
        }
    }
    if !sent {
        return Err(SubtrackError::notify(errors.join("; ")));
    }
    Ok(())
}
