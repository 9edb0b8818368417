//! Notification dispatch — actually sends messages to configured channels.
//! Supports: Telegram Bot API, Bark push server.

use std::time::Duration;

use subtrack_core::error::{Result, SubtrackError};
use subtrack_core::store::SubscriptionStore;

/// Per-call send timeout. A slow or unreachable channel must not stall a
/// scheduler tick beyond this.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Notification target configuration.
#[derive(Debug, Clone)]
pub enum NotifyTarget {
    /// Telegram Bot API — send via `sendMessage`.
    Telegram { bot_token: String, chat_id: String },
    /// Bark push server base URL (self-hosted or bark.day.app).
    Bark { url: String },
}

impl NotifyTarget {
    /// Channel name used in logs and dispatch results.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Telegram { .. } => "telegram",
            Self::Bark { .. } => "bark",
        }
    }
}

/// Dispatch one message to one target. Fire-and-forget from the caller's
/// point of view: failure is reported, never retried here.
pub async fn dispatch(target: &NotifyTarget, title: &str, body: &str) -> Result<()> {
    match target {
        NotifyTarget::Telegram { bot_token, chat_id } => {
            send_telegram(bot_token, chat_id, &format!("{title}\n\n{body}")).await
        }
        NotifyTarget::Bark { url } => send_bark(url, title, body).await,
    }
}

/// Dispatch to every target, collecting per-channel results. One channel's
/// failure never prevents sending to another. An empty target list yields an
/// empty result vector.
pub async fn dispatch_all(
    targets: &[NotifyTarget],
    title: &str,
    body: &str,
) -> Vec<(String, Result<()>)> {
    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        let result = dispatch(target, title, body).await;
        match &result {
            Ok(()) => tracing::info!("✅ {} notification sent: {title}", target.name()),
            Err(e) => tracing::warn!("⚠️ {} send failed: {e}", target.name()),
        }
        results.push((target.name().to_string(), result));
    }
    results
}

/// Send a message via the Telegram Bot API.
async fn send_telegram(bot_token: &str, chat_id: &str, text: &str) -> Result<()> {
    let url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .json(&serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        }))
        .timeout(SEND_TIMEOUT)
        .send()
        .await
        .map_err(|e| SubtrackError::notify(format!("Telegram send failed: {e}")))?;

    if resp.status().is_success() {
        Ok(())
    } else {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(SubtrackError::notify(format!(
            "Telegram API error {status}: {body}"
        )))
    }
}

/// Send a push via a Bark server: GET `{base}/{title}/{body}`.
async fn send_bark(base_url: &str, title: &str, body: &str) -> Result<()> {
    let url = bark_push_url(base_url, title, body);

    let client = reqwest::Client::new();
    let resp = client
        .get(&url)
        .timeout(SEND_TIMEOUT)
        .send()
        .await
        .map_err(|e| SubtrackError::notify(format!("Bark send failed: {e}")))?;

    if resp.status().is_success() {
        Ok(())
    } else {
        Err(SubtrackError::notify(format!(
            "Bark API error {}",
            resp.status()
        )))
    }
}

/// Bark pushes carry title and body as path segments.
fn bark_push_url(base_url: &str, title: &str, body: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(title),
        urlencoding::encode(body)
    )
}

/// Build the target list from store settings. Partially configured channels
/// (e.g. a Telegram token without a chat id) are skipped.
pub fn targets_from_settings(store: &dyn SubscriptionStore) -> Vec<NotifyTarget> {
    let mut targets = Vec::new();

    let bot_token = store.get_setting("telegram_bot_token", "");
    let chat_id = store.get_setting("telegram_chat_id", "");
    if !bot_token.is_empty() && !chat_id.is_empty() {
        targets.push(NotifyTarget::Telegram { bot_token, chat_id });
    }

    let bark_url = store.get_setting("bark_url", "");
    if !bark_url.is_empty() {
        targets.push(NotifyTarget::Bark { url: bark_url });
    }

    targets
}
