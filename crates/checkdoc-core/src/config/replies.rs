use serde::{Deserialize, Serialize};

/// User-visible reply strings. Every field can be overridden under `[replies]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Replies {
    /// Answer to `/start`.
    pub greeting: String,
    /// Sent instead of submitting an empty message.
    pub prompt_for_input: String,
    pub pong: String,
    /// Answer to `/diag`.
    pub diag: String,
    pub help: String,
    /// The assistant run ended in failure.
    pub assistant_failed: String,
    /// The run completed but no assistant message was found.
    pub no_reply: String,
    /// The turn exceeded `turn_timeout_secs`.
    pub timeout: String,
    /// Network or API errors talking to the assistant.
    pub transient_error: String,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            greeting: "\u{1f44b} Hi! I'm your AI assistant. Tell me what's bothering you.".into(),
            prompt_for_input: "Please type your question.".into(),
            pong: "\u{1f3d3} pong".into(),
            diag: "\u{2705} Bot is active. Describe your symptoms for a consultation.".into(),
            help: "Commands: /start, /ping, /diag, /help".into(),
            assistant_failed: "\u{274c} The assistant could not answer.".into(),
            no_reply: "\u{26a0}\u{fe0f} The assistant's reply was not found.".into(),
            timeout: "\u{23f3} The assistant is taking too long. Please try again.".into(),
            transient_error: "\u{26a0}\u{fe0f} Temporary error. Please try again.".into(),
        }
    }
}
