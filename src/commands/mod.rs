//! Built-in bot commands. Answered locally, no provider call.


use checkdoc_core::config::Replies;

/// Known bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Ping,
    Diag,
    Help,
}

impl Command {
    /// Parse a command from message text. Returns `None` for plain text and for
    /// unknown `/` prefixes, which pass through to the assistant.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        // Strip @botname suffix (e.g. "/help@checkdoc_bot" → "/help").
        let cmd = first.split('@').next().unwrap_or(first);
        match cmd {
            "/start" => Some(Self::Start),
            "/ping" => Some(Self::Ping),
            "/diag" => Some(Self::Diag),
            "/help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Handle a command and return the response text.
///
/// `link` is the public bot link appended to `/help` when non-empty.
pub fn handle(cmd: Command, replies: &Replies, link: &str) -> String {
    match cmd {
        Command::Start => replies.greeting.clone(),
        Command::Ping => replies.pong.clone(),
        Command::Diag => replies.diag.clone(),
        Command::Help if link.is_empty() => replies.help.clone(),
        Command::Help => format!("{}\n{link}", replies.help),
    }
}
