//! Gateway: the event loop connecting channels, sessions, and the assistant.
//!
//! Every transport funnels into `respond`, so Telegram chats and web chat
//! sessions follow the same turn rules.

mod conversation;
mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use conversation::{Conversation, TurnError};

use checkdoc_channels::telegram::TelegramChannel;
use checkdoc_core::{
    config::{ApiConfig, ChannelConfig, Replies},
    message::{IncomingMessage, OutgoingMessage},
    traits::{Channel, Provider},
};
use checkdoc_memory::SessionStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The central gateway that routes messages between channels and the assistant.
pub struct Gateway {
    provider: Arc<dyn Provider>,
    channels: HashMap<String, Arc<dyn Channel>>,
    sessions: SessionStore,
    conversation: Conversation,
    replies: Replies,
    channel_config: ChannelConfig,
    api_config: ApiConfig,
    uptime: Instant,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        provider: Arc<dyn Provider>,
        channels: HashMap<String, Arc<dyn Channel>>,
        sessions: SessionStore,
        conversation: Conversation,
        replies: Replies,
        channel_config: ChannelConfig,
        api_config: ApiConfig,
    ) -> Self {
        Self {
            provider,
            channels,
            sessions,
            conversation,
            replies,
            channel_config,
            api_config,
            uptime: Instant::now(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn replies(&self) -> &Replies {
        &self.replies
    }

    pub fn uptime(&self) -> Instant {
        self.uptime
    }

    pub fn channel_config(&self) -> &ChannelConfig {
        &self.channel_config
    }

    /// The Telegram channel, when one is registered.
    pub fn telegram(&self) -> Option<&TelegramChannel> {
        self.channels
            .get("telegram")
            .and_then(|ch| ch.as_any().downcast_ref::<TelegramChannel>())
    }

    /// Run the main event loop.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "CheckDoc gateway running | provider: {} | channels: {} | api: {}",
            self.provider.name(),
            self.channels.keys().cloned().collect::<Vec<_>>().join(", "),
            if self.api_config.enabled {
                format!("{}:{}", self.api_config.host, self.api_config.port)
            } else {
                "disabled".to_string()
            },
        );

        let (tx, mut rx) = mpsc::channel::<IncomingMessage>(256);
        let mut forwarders = Vec::new();

        for (name, channel) in &self.channels {
            let mut channel_rx = channel
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();
            let channel_name = name.clone();

            forwarders.push(tokio::spawn(async move {
                while let Some(msg) = channel_rx.recv().await {
                    if tx.send(msg).await.is_err() {
                        info!("gateway receiver dropped, stopping {channel_name} forwarder");
                        break;
                    }
                }
            }));

            info!("Channel started: {name}");
        }

        drop(tx);

        // Spawn HTTP API server.
        let mut api_handle = if self.api_config.enabled {
            let gw = self.clone();
            let api_cfg = self.api_config.clone();
            Some(tokio::spawn(crate::api::serve(api_cfg, gw)))
        } else {
            None
        };

        // One task per turn; sessions serialize their own turns.
        let mut outcome = Ok(());
        loop {
            tokio::select! {
                Some(incoming) = rx.recv() => {
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.handle_message(incoming).await;
                    });
                }
                err = api_stopped(&mut api_handle) => {
                    error!("{err:#}");
                    outcome = Err(err);
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(&forwarders, &api_handle).await;
        outcome
    }

    /// Answer one user message on behalf of `session_key`.
    ///
    /// Never fails: every error becomes one of the configured replies, and the
    /// session binding survives for the next turn.
    pub async fn respond(&self, session_key: &str, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return self.replies.prompt_for_input.clone();
        }

        let session = match self.sessions.resolve(session_key, self.provider.as_ref()).await {
            Ok(session) => session,
            Err(e) => {
                warn!("[{session_key}] failed to create context: {e}");
                return self.replies.transient_error.clone();
            }
        };

        let _turn = session.begin_turn().await;

        match self.conversation.converse(session.context_id(), text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("[{}] turn failed ({}): {e}", session.key(), e.kind());
                self.reply_for(&e).to_string()
            }
        }
    }

    /// User-visible text for a failed turn.
    pub fn reply_for(&self, err: &TurnError) -> &str {
        match err {
            TurnError::AssistantFailed(_) => &self.replies.assistant_failed,
            TurnError::NoReplyFound(_) => &self.replies.no_reply,
            TurnError::Timeout(_) => &self.replies.timeout,
            TurnError::Submission(_) | TurnError::Start(_) | TurnError::Transient(_) => {
                &self.replies.transient_error
            }
        }
    }

    /// Graceful shutdown: stop background tasks and channels.
    async fn shutdown(
        &self,
        forwarders: &[JoinHandle<()>],
        api_handle: &Option<JoinHandle<anyhow::Result<()>>>,
    ) {
        info!("Shutting down...");

        for h in forwarders {
            h.abort();
        }
        if let Some(h) = api_handle {
            h.abort();
        }

        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!("failed to stop channel {name}: {e}");
            }
        }

        info!("Shutdown complete.");
    }

    /// Send a text reply back to the sender of `incoming`.
    async fn send_text(&self, incoming: &IncomingMessage, text: &str) {
        let msg = OutgoingMessage {
            text: text.to_string(),
            reply_target: incoming.reply_target.clone(),
        };

        if let Some(channel) = self.channels.get(&incoming.channel) {
            if let Err(e) = channel.send(msg).await {
                error!("failed to send message: {e}");
            }
        }
    }
}

/// Resolves when the API task ends; never resolves when the API is disabled.
async fn api_stopped(handle: &mut Option<JoinHandle<anyhow::Result<()>>>) -> anyhow::Error {
    let Some(handle) = handle else {
        return std::future::pending().await;
    };
    match handle.await {
        Ok(Ok(())) => anyhow::anyhow!("API server stopped unexpectedly"),
        Ok(Err(e)) => e,
        Err(e) => anyhow::anyhow!("API server task failed: {e}"),
    }
}
