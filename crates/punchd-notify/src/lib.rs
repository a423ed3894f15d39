//! `punchd-notify` — best-effort outcome delivery.
//!
//! One Telegram Bot API transport plus a no-op fallback. Delivery failures
//! are logged and swallowed; the orchestrator never sees them.

pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use punchd_core::config::NotifyConfig;
use punchd_core::notify::Notifier;

pub use telegram::TelegramNotifier;

/// Notifier used when no channel is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, subject: &str, _body: &str) {
        debug!(subject, "no notification channel configured — dropping");
    }
}

/// Build the configured notifier, falling back to a no-op.
pub fn from_config(cfg: &NotifyConfig) -> Arc<dyn Notifier> {
    match &cfg.telegram {
        Some(telegram) => Arc::new(TelegramNotifier::new(
            telegram.bot_token.clone(),
            telegram.chat_id,
        )),
        None => Arc::new(NoopNotifier),
    }
}
