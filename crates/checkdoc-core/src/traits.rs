use crate::{
    assistant::{ContextId, Role, RunId, RunStatus, ThreadMessage},
    error::CheckdocError,
    message::{IncomingMessage, OutgoingMessage},
};
use async_trait::async_trait;

/// Remote assistant service.
///
/// Holds conversation state server-side: contexts collect messages, and runs
/// process a context asynchronously until they complete or fail.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Create a fresh conversation context.
    async fn create_context(&self) -> Result<ContextId, CheckdocError>;

    /// Append a message to a context.
    async fn create_message(
        &self,
        context: &ContextId,
        role: Role,
        text: &str,
    ) -> Result<(), CheckdocError>;

    /// Start processing a context. Returns the run handle to poll.
    async fn start_run(&self, context: &ContextId) -> Result<RunId, CheckdocError>;

    /// Query the current status of a run.
    async fn get_run_status(
        &self,
        context: &ContextId,
        run: &RunId,
    ) -> Result<RunStatus, CheckdocError>;

    /// List the messages of a context, newest first.
    async fn list_messages(&self, context: &ContextId) -> Result<Vec<ThreadMessage>, CheckdocError>;

    /// Check if the provider is reachable and configured.
    async fn is_available(&self) -> bool;
}

/// Messaging Channel trait.
///
/// Every transport (Telegram today) implements this trait to receive and
/// send messages.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    /// Returns a receiver that yields incoming messages.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, CheckdocError>;

    /// Send a response back through this channel.
    async fn send(&self, message: OutgoingMessage) -> Result<(), CheckdocError>;

    /// Send a typing indicator to show the bot is processing.
    async fn send_typing(&self, _target: &str) -> Result<(), CheckdocError> {
        Ok(())
    }

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), CheckdocError>;

    /// Downcast support for transport-specific entry points (e.g. webhooks).
    fn as_any(&self) -> &dyn std::any::Any;
}
