//! Outbound Bot API calls: messages, chat actions, commands, webhook setup.

use super::types::TgResponse;
use super::TelegramChannel;
use checkdoc_core::error::CheckdocError;
use tracing::{debug, info, warn};

/// Telegram's maximum message length.
const MAX_MESSAGE_LEN: usize = 4096;

impl TelegramChannel {
    /// Send a text message to a specific chat.
    pub(crate) async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), CheckdocError> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let url = format!("{}/sendMessage", self.base_url);
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
                "parse_mode": "HTML",
            });

            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| CheckdocError::Channel(format!("telegram send failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let error_text = resp.text().await.unwrap_or_default();
                if error_text.contains("can't parse entities") {
                    debug!("HTML parse failed, retrying as plain text");
                    let plain_body = serde_json::json!({
                        "chat_id": chat_id,
                        "text": chunk,
                    });
                    self.client
                        .post(&url)
                        .json(&plain_body)
                        .send()
                        .await
                        .map_err(|e| {
                            CheckdocError::Channel(format!("telegram send (plain) failed: {e}"))
                        })?;
                } else {
                    warn!("telegram send got {status}: {error_text}");
                }
            }
        }

        Ok(())
    }

    /// Send a chat action (e.g. "typing") to a chat.
    pub(crate) async fn send_chat_action(
        &self,
        chat_id: i64,
        action: &str,
    ) -> Result<(), CheckdocError> {
        let url = format!("{}/sendChatAction", self.base_url);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "action": action,
        });

        self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CheckdocError::Channel(format!("telegram sendChatAction failed: {e}")))?;

        Ok(())
    }

    /// Register bot commands with Telegram so users see an autocomplete menu.
    /// Best-effort: logs failures but does not propagate errors.
    pub(crate) async fn register_commands(&self) {
        let commands = serde_json::json!({
            "commands": [
                { "command": "start", "description": "Start a consultation" },
                { "command": "ping", "description": "Check that the bot responds" },
                { "command": "diag", "description": "Bot status" },
                { "command": "help", "description": "Show available commands" },
            ]
        });

        let url = format!("{}/setMyCommands", self.base_url);
        match self.client.post(&url).json(&commands).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("registered Telegram bot commands");
            }
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                warn!("failed to register Telegram bot commands: {body}");
            }
            Err(e) => {
                warn!("failed to register Telegram bot commands: {e}");
            }
        }
    }

    /// Remove any registered webhook and drop updates queued while it was set.
    /// Best-effort: polling still starts if this fails.
    pub(crate) async fn delete_webhook(&self) {
        let url = format!("{}/deleteWebhook?drop_pending_updates=true", self.base_url);
        match self.client.post(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Telegram webhook removed, switching to polling");
            }
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                warn!("failed to remove Telegram webhook: {body}");
            }
            Err(e) => {
                warn!("failed to remove Telegram webhook: {e}");
            }
        }
    }

    /// Point Telegram at our webhook endpoint.
    pub(crate) async fn set_webhook(&self, webhook_url: &str) -> Result<(), CheckdocError> {
        let mut body = serde_json::json!({ "url": webhook_url });
        if !self.config.webhook_secret.is_empty() {
            body["secret_token"] = serde_json::Value::String(self.config.webhook_secret.clone());
        }

        let url = format!("{}/setWebhook", self.base_url);
        let resp: TgResponse<bool> = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CheckdocError::Channel(format!("telegram setWebhook failed: {e}")))?
            .json()
            .await
            .map_err(|e| CheckdocError::Channel(format!("telegram setWebhook parse failed: {e}")))?;

        if !resp.ok {
            return Err(CheckdocError::Channel(format!(
                "telegram setWebhook rejected: {}",
                resp.description.unwrap_or_default()
            )));
        }

        info!("Telegram webhook set: {webhook_url}");
        Ok(())
    }
}

/// Split text into chunks of at most `max_len` bytes, preferring newline
/// boundaries and never splitting a UTF-8 character.
pub(crate) fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // max_len is narrower than this character; emit it whole.
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
