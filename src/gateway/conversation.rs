//! Conversation driver: one user turn against a remote context.
//!
//! submit → start run → poll until terminal → extract the reply, all under a
//! single deadline.

use checkdoc_core::{
    assistant::{ContextId, Role, RunId, RunStatus, ThreadMessage},
    error::CheckdocError,
    traits::Provider,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a turn produced no reply.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("failed to submit message: {0}")]
    Submission(#[source] CheckdocError),

    #[error("failed to start run: {0}")]
    Start(#[source] CheckdocError),

    #[error("assistant run {0} failed")]
    AssistantFailed(RunId),

    #[error("run {0} completed without an assistant reply")]
    NoReplyFound(RunId),

    #[error("turn exceeded {0:?}")]
    Timeout(Duration),

    /// Network or API error while polling or listing.
    #[error("transient provider error: {0}")]
    Transient(#[source] CheckdocError),
}

impl TurnError {
    /// Stable identifier for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Submission(_) => "submission_error",
            Self::Start(_) => "start_error",
            Self::AssistantFailed(_) => "assistant_failed",
            Self::NoReplyFound(_) => "no_reply_found",
            Self::Timeout(_) => "timeout",
            Self::Transient(_) => "transient",
        }
    }
}

/// Drives turns against a provider.
#[derive(Clone)]
pub struct Conversation {
    provider: Arc<dyn Provider>,
    poll_interval: Duration,
    turn_timeout: Duration,
}

impl Conversation {
    pub fn new(provider: Arc<dyn Provider>, poll_interval: Duration, turn_timeout: Duration) -> Self {
        Self {
            provider,
            poll_interval,
            turn_timeout,
        }
    }

    /// Submit `text` to `context` and wait for the assistant's answer.
    ///
    /// On timeout the in-flight run is abandoned, not cancelled remotely, and
    /// no further status queries are issued.
    pub async fn converse(&self, context: &ContextId, text: &str) -> Result<String, TurnError> {
        match tokio::time::timeout(self.turn_timeout, self.run_turn(context, text)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("turn on context {context} timed out after {:?}", self.turn_timeout);
                Err(TurnError::Timeout(self.turn_timeout))
            }
        }
    }

    async fn run_turn(&self, context: &ContextId, text: &str) -> Result<String, TurnError> {
        self.provider
            .create_message(context, Role::User, text)
            .await
            .map_err(TurnError::Submission)?;

        let run = self
            .provider
            .start_run(context)
            .await
            .map_err(TurnError::Start)?;
        debug!("context {context}: started run {run}");

        self.wait_for_completion(context, &run).await?;

        let messages = self
            .provider
            .list_messages(context)
            .await
            .map_err(TurnError::Transient)?;

        match extract_reply(&messages, &run) {
            Some(reply) => {
                info!("context {context}: run {run} answered ({} chars)", reply.len());
                Ok(reply)
            }
            None => Err(TurnError::NoReplyFound(run)),
        }
    }

    async fn wait_for_completion(&self, context: &ContextId, run: &RunId) -> Result<(), TurnError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let status = self
                .provider
                .get_run_status(context, run)
                .await
                .map_err(TurnError::Transient)?;

            match status {
                RunStatus::Completed => return Ok(()),
                RunStatus::Failed => return Err(TurnError::AssistantFailed(run.clone())),
                RunStatus::Pending => continue,
            }
        }
    }
}

/// First assistant message with text, skipping messages authored by other runs.
pub(crate) fn extract_reply(messages: &[ThreadMessage], run: &RunId) -> Option<String> {
    messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .filter(|m| m.run_id.as_ref().map_or(true, |id| id == run))
        .map(|m| m.text.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
}
