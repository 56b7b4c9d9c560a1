//! Telegram Bot API channel.
//!
//! Receives updates by long polling (`getUpdates`) or by webhook, and replies
//! with `sendMessage`.
//! Docs: <https://core.telegram.org/bots/api>

mod polling;
pub(crate) mod send;
pub(crate) mod types;
mod webhook;

#[cfg(test)]
mod tests;

use checkdoc_core::{config::TelegramConfig, message::IncomingMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram channel using the Bot API.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    base_url: String,
    /// Tracks the last update_id to avoid reprocessing.
    last_update_id: Arc<Mutex<Option<i64>>>,
    /// Recently pushed update ids; webhook deliveries arrive out of order.
    seen_updates: Mutex<webhook::RecentUpdates>,
    /// Queue for webhook-delivered updates; set by `start` in webhook mode.
    inbound: Mutex<Option<mpsc::Sender<IncomingMessage>>>,
    /// Long-polling task, aborted on `stop`.
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    /// Create a new Telegram channel from config.
    pub fn new(config: TelegramConfig) -> Self {
        Self::with_api_url(config, TELEGRAM_API_URL)
    }

    /// Create a channel talking to a different Bot API server (local server, tests).
    pub fn with_api_url(config: TelegramConfig, api_url: &str) -> Self {
        let base_url = format!(
            "{}/bot{}",
            api_url.trim_end_matches('/'),
            config.bot_token
        );
        Self {
            config,
            client: reqwest::Client::new(),
            base_url,
            last_update_id: Arc::new(Mutex::new(None)),
            seen_updates: Mutex::new(webhook::RecentUpdates::default()),
            inbound: Mutex::new(None),
            poller: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }
}
