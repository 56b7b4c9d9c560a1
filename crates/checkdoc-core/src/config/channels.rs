use serde::{Deserialize, Serialize};

use super::defaults::default_webhook_path;

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    pub telegram: Option<TelegramConfig>,
}

/// How the Telegram bot receives updates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelegramMode {
    /// Long polling via `getUpdates`.
    #[default]
    Polling,
    /// Telegram pushes updates to `{webhook_base}{webhook_path}`.
    Webhook,
}

/// Telegram bot config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub mode: TelegramMode,
    /// Public base URL (e.g. `https://checkdoc.up.railway.app`).
    #[serde(default)]
    pub webhook_base: String,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    /// Echoed by Telegram in `X-Telegram-Bot-Api-Secret-Token`. Empty = unchecked.
    #[serde(default)]
    pub webhook_secret: String,
    /// Public t.me link advertised by `/help`.
    #[serde(default)]
    pub link: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            mode: TelegramMode::default(),
            webhook_base: String::new(),
            webhook_path: default_webhook_path(),
            webhook_secret: String::new(),
            link: String::new(),
        }
    }
}

impl TelegramConfig {
    /// Full webhook URL, if a base is configured.
    pub fn webhook_url(&self) -> Option<String> {
        let base = self.webhook_base.trim();
        if base.is_empty() {
            return None;
        }
        Some(format!("{}{}", base.trim_end_matches('/'), self.webhook_path))
    }
}
