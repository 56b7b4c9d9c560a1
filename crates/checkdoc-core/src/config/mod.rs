mod channels;
mod defaults;
mod replies;


pub use channels::*;
pub use replies::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::CheckdocError;
use defaults::*;

/// Top-level CheckDoc configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub checkdoc: CheckdocConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub replies: Replies,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckdocConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Also write logs to this file when set.
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for CheckdocConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// Remote assistant (OpenAI Assistants API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Assistant to run against every context (`asst_...`).
    #[serde(default)]
    pub assistant_id: String,
    /// Delay between run status queries.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound for one user turn, submit through reply extraction.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
    /// Timeout for each individual HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: String::new(),
            assistant_id: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            turn_timeout_secs: default_turn_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Session store limits. Zero disables a limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub idle_ttl_secs: u64,
    #[serde(default)]
    pub max_sessions: usize,
}

/// HTTP API configuration: web chat, Telegram webhook receiver, health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Cookie identifying a web chat session.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_cookie_max_age_secs")]
    pub cookie_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_api_host(),
            port: default_api_port(),
            cookie_name: default_cookie_name(),
            cookie_max_age_secs: default_cookie_max_age_secs(),
        }
    }
}

impl Config {
    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`. Empty values are ignored.
    ///
    /// Secrets usually come from the deployment environment rather than the
    /// config file, so these always win over file values.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(id) = get("OPENAI_ASSISTANT_ID").or_else(|| get("GPT_ID")) {
            self.provider.assistant_id = id;
        }
        if let Some(base) = get("OPENAI_BASE_URL") {
            self.provider.base_url = base;
        }

        if let Some(token) = get("TELEGRAM_TOKEN") {
            let tg = self
                .channel
                .telegram
                .get_or_insert_with(TelegramConfig::default);
            tg.bot_token = token;
            tg.enabled = true;
        }
        if let Some(tg) = self.channel.telegram.as_mut() {
            if let Some(base) = get("WEBHOOK_BASE") {
                tg.webhook_base = base;
                tg.mode = TelegramMode::Webhook;
            }
            if let Some(link) = get("TELEGRAM_LINK") {
                tg.link = link;
            }
        }

        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(p) => {
                    self.api.port = p;
                    self.api.enabled = true;
                }
                Err(e) => tracing::warn!("ignoring invalid PORT '{port}': {e}"),
            }
        }
    }

    /// Reject configurations that cannot serve traffic.
    pub fn validate(&self) -> Result<(), CheckdocError> {
        if self.provider.api_key.trim().is_empty() {
            return Err(CheckdocError::Config(
                "provider api_key is empty. Set it in config.toml or OPENAI_API_KEY.".into(),
            ));
        }
        if self.provider.assistant_id.trim().is_empty() {
            return Err(CheckdocError::Config(
                "provider assistant_id is empty. Set it in config.toml or GPT_ID.".into(),
            ));
        }
        if self.provider.poll_interval_ms == 0 {
            return Err(CheckdocError::Config(
                "provider poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.provider.turn_timeout_secs == 0 {
            return Err(CheckdocError::Config(
                "provider turn_timeout_secs must be greater than zero".into(),
            ));
        }

        let telegram = self.channel.telegram.as_ref().filter(|tg| tg.enabled);
        if let Some(tg) = telegram {
            if tg.bot_token.trim().is_empty() {
                return Err(CheckdocError::Config(
                    "Telegram is enabled but bot_token is empty. \
                     Set it in config.toml or TELEGRAM_TOKEN."
                        .into(),
                ));
            }
            if !tg.webhook_path.starts_with('/') {
                return Err(CheckdocError::Config(format!(
                    "Telegram webhook_path must start with '/', got '{}'",
                    tg.webhook_path
                )));
            }
            if tg.mode == TelegramMode::Webhook {
                if tg.webhook_base.trim().is_empty() {
                    return Err(CheckdocError::Config(
                        "Telegram webhook mode needs webhook_base (or WEBHOOK_BASE).".into(),
                    ));
                }
                if !self.api.enabled {
                    return Err(CheckdocError::Config(
                        "Telegram webhook mode needs the HTTP API enabled to receive updates."
                            .into(),
                    ));
                }
            }
        }

        if telegram.is_none() && !self.api.enabled {
            return Err(CheckdocError::Config(
                "No transports enabled. Enable Telegram or the HTTP API in config.toml.".into(),
            ));
        }

        Ok(())
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, CheckdocError> {
    let path = Path::new(path);
    if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| CheckdocError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| CheckdocError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
