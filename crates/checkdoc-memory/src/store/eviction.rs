use super::Entry;
use checkdoc_core::config::SessionConfig;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Limits on how long and how many sessions are kept.
///
/// The default keeps everything for the process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Drop sessions not used for this long.
    pub idle_ttl: Option<Duration>,
    /// Evict the least recently used session beyond this many.
    pub max_sessions: Option<usize>,
}

impl EvictionPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Zero values in the config disable the corresponding limit.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            idle_ttl: (config.idle_ttl_secs > 0).then(|| Duration::from_secs(config.idle_ttl_secs)),
            max_sessions: (config.max_sessions > 0).then_some(config.max_sessions),
        }
    }

    pub(super) fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        match self.idle_ttl {
            Some(ttl) => now.saturating_duration_since(entry.last_used) >= ttl,
            None => false,
        }
    }

    /// Remove idle entries. Returns how many were removed.
    pub(super) fn purge_expired(&self, entries: &mut HashMap<String, Entry>, now: Instant) -> usize {
        if self.idle_ttl.is_none() {
            return 0;
        }
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    /// Make space for one more entry by evicting least recently used entries
    /// while at capacity. Returns the evicted keys.
    ///
    /// Entries still in use are never evicted. When every entry is busy the
    /// map grows past `max_sessions` until some of them are released.
    pub(super) fn make_room(&self, entries: &mut HashMap<String, Entry>) -> Vec<String> {
        let mut evicted = Vec::new();
        let Some(max) = self.max_sessions else {
            return evicted;
        };
        while entries.len() >= max {
            let Some(oldest) = entries
                .iter()
                .filter(|(_, entry)| !entry.slot.is_busy())
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&oldest);
            evicted.push(oldest);
        }
        evicted
    }
}
