//! Webhook entry point: updates pushed by Telegram to our HTTP server.

use super::polling::incoming_from_update;
use super::types::TgUpdate;
use super::TelegramChannel;
use checkdoc_core::{config::TelegramMode, error::CheckdocError};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};

/// How many pushed update ids to remember for redelivery checks.
const SEEN_UPDATES_CAP: usize = 1024;

/// Bounded set of recently seen update ids, oldest evicted first.
///
/// Telegram pushes over several parallel connections, so ids are not
/// monotonic and a high-water mark would drop real messages.
#[derive(Default)]
pub(super) struct RecentUpdates {
    order: VecDeque<i64>,
    ids: HashSet<i64>,
}

impl RecentUpdates {
    /// Record `id`; returns false if it was already seen.
    fn insert(&mut self, id: i64) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > SEEN_UPDATES_CAP {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }
}

impl TelegramChannel {
    /// Whether the channel was started in webhook mode and accepts pushed updates.
    pub async fn webhook_active(&self) -> bool {
        self.config.mode == TelegramMode::Webhook && self.inbound.lock().await.is_some()
    }

    /// Feed one pushed update into the channel's message stream.
    ///
    /// Returns `Ok(false)` for updates that carry no text message or that were
    /// already seen (Telegram redelivers when a response is slow or fails).
    pub async fn feed_update(&self, payload: serde_json::Value) -> Result<bool, CheckdocError> {
        let update: TgUpdate = serde_json::from_value(payload)?;

        let tx = self.inbound.lock().await.clone().ok_or_else(|| {
            CheckdocError::Channel("telegram webhook update received before channel start".into())
        })?;

        if !self.seen_updates.lock().await.insert(update.update_id) {
            debug!("telegram: ignoring redelivered update {}", update.update_id);
            return Ok(false);
        }

        let Some(incoming) = incoming_from_update(update) else {
            return Ok(false);
        };

        if tx.send(incoming).await.is_err() {
            info!("telegram channel receiver dropped, discarding webhook update");
            return Err(CheckdocError::Channel("telegram receiver dropped".into()));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_updates_forgets_oldest() {
        let mut seen = RecentUpdates::default();
        for id in 0..SEEN_UPDATES_CAP as i64 {
            assert!(seen.insert(id));
        }
        assert!(!seen.insert(0));

        assert!(seen.insert(SEEN_UPDATES_CAP as i64));
        assert_eq!(seen.order.len(), SEEN_UPDATES_CAP);
        assert!(seen.insert(0), "evicted id is accepted again");
    }
}
