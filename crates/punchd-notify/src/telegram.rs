//! Telegram Bot API delivery.

use async_trait::async_trait;
use tracing::{debug, warn};

use punchd_core::notify::Notifier;

pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: String,
    chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: i64) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }

    async fn send(&self, text: &str) -> Result<(), reqwest::Error> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
            }))
            .send()
            .await?;
        resp.error_for_status()?;
        Ok(())
    }
}

/// `subject` becomes the first line, `body` the rest of the message.
pub fn format_message(subject: &str, body: &str) -> String {
    format!("{subject}\n\n{body}")
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        match self.send(&format_message(subject, body)).await {
            Ok(()) => debug!(subject, "notification delivered"),
            // Best-effort: a failed notification never escalates.
            Err(e) => warn!(subject, error = %e, "notification delivery failed"),
        }
    }
}
