//! Per-message handling for channel traffic.

use super::Gateway;
use crate::commands;
use checkdoc_core::message::IncomingMessage;
use std::time::Duration;
use tracing::info;

/// Telegram clears the typing status after about five seconds.
const TYPING_REFRESH: Duration = Duration::from_secs(4);

impl Gateway {
    /// Answer one channel message: commands locally, free text via the assistant.
    pub(super) async fn handle_message(&self, incoming: IncomingMessage) {
        let preview = if incoming.text.chars().count() > 60 {
            let truncated: String = incoming.text.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            incoming.text.clone()
        };
        info!(
            "[{}] {} says: {}",
            incoming.channel,
            incoming
                .sender_name
                .as_deref()
                .unwrap_or(&incoming.sender_id),
            preview
        );

        if let Some(cmd) = commands::Command::parse(&incoming.text) {
            let link = self
                .channel_config
                .telegram
                .as_ref()
                .map(|tg| tg.link.as_str())
                .unwrap_or_default();
            let response = commands::handle(cmd, self.replies(), link);
            self.send_text(&incoming, &response).await;
            return;
        }

        let typing_handle = match (
            self.channels.get(&incoming.channel),
            incoming.reply_target.as_ref(),
        ) {
            (Some(ch), Some(target)) => {
                let ch = ch.clone();
                let target = target.clone();
                let _ = ch.send_typing(&target).await;
                Some(tokio::spawn(async move {
                    loop {
                        tokio::time::sleep(TYPING_REFRESH).await;
                        if ch.send_typing(&target).await.is_err() {
                            break;
                        }
                    }
                }))
            }
            _ => None,
        };

        let reply = self
            .respond(&incoming.session_key(), &incoming.text)
            .await;

        if let Some(h) = typing_handle {
            h.abort();
        }

        self.send_text(&incoming, &reply).await;
    }
}
