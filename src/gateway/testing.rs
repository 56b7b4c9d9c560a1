//! Scripted test doubles for the assistant service and transports.

use super::{Conversation, Gateway};
use async_trait::async_trait;
use checkdoc_core::{
    assistant::{ContextId, Role, RunId, RunStatus, ThreadMessage},
    config::{ApiConfig, ChannelConfig, Replies},
    error::CheckdocError,
    message::{IncomingMessage, OutgoingMessage},
    traits::{Channel, Provider},
};
use checkdoc_memory::SessionStore;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(700);
pub(crate) const TURN_TIMEOUT: Duration = Duration::from_secs(45);

/// Provider operations, as recorded by [`ScriptedProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    CreateContext,
    CreateMessage,
    StartRun,
    GetRunStatus,
    ListMessages,
}

/// Provider that plays back scripted run statuses and message lists.
///
/// Once the status script runs out every poll reports `Pending`. Runs in a
/// stalled context stay `Pending` without consuming the script.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    calls: Mutex<Vec<Call>>,
    statuses: Mutex<VecDeque<RunStatus>>,
    stalled: HashSet<ContextId>,
    messages: Mutex<Vec<ThreadMessage>>,
    submitted: Mutex<Vec<(ContextId, String)>>,
    fail_on: Option<Call>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_statuses(self, statuses: impl IntoIterator<Item = RunStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into_iter().collect();
        self
    }

    /// Messages returned by `list_messages`, newest first.
    pub(crate) fn with_messages(self, messages: Vec<ThreadMessage>) -> Self {
        *self.messages.lock().unwrap() = messages;
        self
    }

    pub(crate) fn stalling(mut self, context: &str) -> Self {
        self.stalled.insert(ContextId::new(context));
        self
    }

    pub(crate) fn failing_on(mut self, call: Call) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    /// Texts submitted through `create_message`, in order.
    pub(crate) fn submitted(&self) -> Vec<(ContextId, String)> {
        self.submitted.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), CheckdocError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.iter().filter(|c| **c == call).count()
        };
        if self.fail_on == Some(call) {
            return Err(CheckdocError::Provider(format!("scripted {call:?} #{n} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_context(&self) -> Result<ContextId, CheckdocError> {
        self.record(Call::CreateContext)?;
        Ok(ContextId::new(format!(
            "thread_{}",
            self.count(Call::CreateContext)
        )))
    }

    async fn create_message(
        &self,
        context: &ContextId,
        role: Role,
        text: &str,
    ) -> Result<(), CheckdocError> {
        self.record(Call::CreateMessage)?;
        assert_eq!(role, Role::User);
        self.submitted
            .lock()
            .unwrap()
            .push((context.clone(), text.to_string()));
        Ok(())
    }

    async fn start_run(&self, _context: &ContextId) -> Result<RunId, CheckdocError> {
        self.record(Call::StartRun)?;
        Ok(RunId::new(format!("run_{}", self.count(Call::StartRun))))
    }

    async fn get_run_status(
        &self,
        context: &ContextId,
        _run: &RunId,
    ) -> Result<RunStatus, CheckdocError> {
        self.record(Call::GetRunStatus)?;
        if self.stalled.contains(context) {
            return Ok(RunStatus::Pending);
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RunStatus::Pending))
    }

    async fn list_messages(&self, _context: &ContextId) -> Result<Vec<ThreadMessage>, CheckdocError> {
        self.record(Call::ListMessages)?;
        Ok(self.messages.lock().unwrap().clone())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Channel that records what the gateway sends.
#[derive(Default)]
pub(crate) struct RecordingChannel {
    pub(crate) sent: Mutex<Vec<OutgoingMessage>>,
    pub(crate) typing: Mutex<Vec<String>>,
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, CheckdocError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), CheckdocError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_typing(&self, target: &str) -> Result<(), CheckdocError> {
        self.typing.lock().unwrap().push(target.to_string());
        Ok(())
    }

    async fn stop(&self) -> Result<(), CheckdocError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) fn conversation(provider: Arc<ScriptedProvider>) -> Conversation {
    Conversation::new(provider, POLL_INTERVAL, TURN_TIMEOUT)
}

/// Gateway over `provider` with default replies and the given channels.
pub(crate) fn gateway_with_channels(
    provider: Arc<ScriptedProvider>,
    channels: HashMap<String, Arc<dyn Channel>>,
) -> Gateway {
    Gateway::new(
        provider.clone(),
        channels,
        SessionStore::default(),
        conversation(provider),
        Replies::default(),
        ChannelConfig::default(),
        ApiConfig::default(),
    )
}

pub(crate) fn gateway(provider: Arc<ScriptedProvider>) -> Gateway {
    gateway_with_channels(provider, HashMap::new())
}

/// A reply authored by `run`.
pub(crate) fn assistant_reply(text: &str, run: &str) -> ThreadMessage {
    ThreadMessage::new(Role::Assistant, text).with_run(RunId::new(run))
}
