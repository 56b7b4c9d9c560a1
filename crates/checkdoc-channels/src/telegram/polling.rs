//! Long-polling update loop and Channel trait implementation.

use super::types::{TgResponse, TgUpdate};
use super::TelegramChannel;
use async_trait::async_trait;
use checkdoc_core::{
    config::TelegramMode,
    error::CheckdocError,
    message::{IncomingMessage, OutgoingMessage},
    traits::Channel,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};
use uuid::Uuid;

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, CheckdocError> {
        self.register_commands().await;

        let (tx, rx) = mpsc::channel(64);

        match self.config.mode {
            TelegramMode::Webhook => {
                let url = self.config.webhook_url().ok_or_else(|| {
                    CheckdocError::Channel("telegram webhook mode without webhook_base".into())
                })?;
                // Accept pushes as soon as Telegram knows the URL.
                *self.inbound.lock().await = Some(tx);
                if let Err(e) = self.set_webhook(&url).await {
                    self.inbound.lock().await.take();
                    return Err(e);
                }
                info!("Telegram channel receiving updates via webhook at {url}");
            }
            TelegramMode::Polling => {
                // getUpdates is refused while a webhook is registered.
                self.delete_webhook().await;

                let client = self.client.clone();
                let base_url = self.base_url.clone();
                let last_update_id = self.last_update_id.clone();

                info!("Telegram channel starting long polling...");

                let handle = tokio::spawn(async move {
                    poll_updates(client, base_url, last_update_id, tx).await;
                });
                *self.poller.lock().await = Some(handle);
            }
        }

        Ok(rx)
    }

    async fn send_typing(&self, target: &str) -> Result<(), CheckdocError> {
        let chat_id = parse_chat_id(target)?;
        self.send_chat_action(chat_id, "typing").await
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), CheckdocError> {
        let chat_id_str = message
            .reply_target
            .as_deref()
            .ok_or_else(|| CheckdocError::Channel("no reply_target on outgoing message".into()))?;

        let chat_id = parse_chat_id(chat_id_str)?;
        self.send_text(chat_id, &message.text).await
    }

    async fn stop(&self) -> Result<(), CheckdocError> {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        self.inbound.lock().await.take();
        info!("Telegram channel stopped");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn parse_chat_id(target: &str) -> Result<i64, CheckdocError> {
    target
        .parse()
        .map_err(|e| CheckdocError::Channel(format!("invalid telegram chat_id '{target}': {e}")))
}

/// Long-poll `getUpdates` until the receiver is dropped.
async fn poll_updates(
    client: reqwest::Client,
    base_url: String,
    last_update_id: Arc<Mutex<Option<i64>>>,
    tx: mpsc::Sender<IncomingMessage>,
) {
    let mut backoff_secs: u64 = 1;

    loop {
        let offset = last_update_id.lock().await.map(|id| id + 1);

        let mut url = format!("{base_url}/getUpdates?timeout=30");
        if let Some(off) = offset {
            url.push_str(&format!("&offset={off}"));
        }

        let resp = match client
            .get(&url)
            .timeout(Duration::from_secs(35))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("telegram poll error (retry in {backoff_secs}s): {e}");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = (backoff_secs * 2).min(60);
                continue;
            }
        };

        let body: TgResponse<Vec<TgUpdate>> = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                error!("telegram parse error (retry in {backoff_secs}s): {e}");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = (backoff_secs * 2).min(60);
                continue;
            }
        };

        if !body.ok {
            error!(
                "telegram API error (retry in {backoff_secs}s): {}",
                body.description.unwrap_or_default()
            );
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            backoff_secs = (backoff_secs * 2).min(60);
            continue;
        }

        // Successful poll -- reset backoff.
        backoff_secs = 1;

        let updates = body.result.unwrap_or_default();

        if let Some(last_update) = updates.last() {
            *last_update_id.lock().await = Some(last_update.update_id);
        }

        for update in updates {
            let Some(incoming) = incoming_from_update(update) else {
                continue;
            };
            if tx.send(incoming).await.is_err() {
                info!("telegram channel receiver dropped, stopping poll");
                return;
            }
        }
    }
}

/// Convert an update into an incoming message. Non-text updates yield `None`.
pub(super) fn incoming_from_update(update: TgUpdate) -> Option<IncomingMessage> {
    let msg = update.message?;

    let Some(text) = msg.text else {
        debug!("telegram: skipping non-text update {}", update.update_id);
        return None;
    };

    let user = msg.from?;

    Some(IncomingMessage {
        id: Uuid::new_v4(),
        channel: "telegram".to_string(),
        sender_id: user.id.to_string(),
        sender_name: Some(user.display_name()),
        text,
        timestamp: chrono::Utc::now(),
        reply_target: Some(msg.chat.id.to_string()),
    })
}
