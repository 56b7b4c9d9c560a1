//! Session store: binds a local session key (Telegram user, browser cookie)
//! to the remote conversation context holding its history.
//!
//! Submodules:
//! - `eviction`: idle TTL and capacity limits

mod eviction;


pub use eviction::EvictionPolicy;

use checkdoc_core::{assistant::ContextId, error::CheckdocError, traits::Provider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OnceCell, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, info};

/// Per-key state. The context is created at most once per slot.
struct Slot {
    context: OnceCell<ContextId>,
    turn: Arc<tokio::sync::Mutex<()>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            context: OnceCell::new(),
            turn: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Context creation still running, or a resolver or `Session` still holds it.
    fn is_busy(self: &Arc<Self>) -> bool {
        !self.context.initialized()
            || Arc::strong_count(self) > 1
            || Arc::strong_count(&self.turn) > 1
    }
}

struct Entry {
    slot: Arc<Slot>,
    last_used: Instant,
}

/// A resolved session: the remote context plus the lock serializing its turns.
#[derive(Debug, Clone)]
pub struct Session {
    key: String,
    context_id: ContextId,
    turn: Arc<tokio::sync::Mutex<()>>,
}

impl Session {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    /// Wait for earlier turns on this session to finish. Turns are granted in
    /// arrival order and the guard must be held for the whole turn.
    pub async fn begin_turn(&self) -> OwnedMutexGuard<()> {
        self.turn.clone().lock_owned().await
    }
}

/// In-memory session-to-context mapping, shared by every transport.
pub struct SessionStore {
    entries: Mutex<HashMap<String, Entry>>,
    policy: EvictionPolicy,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(EvictionPolicy::unbounded())
    }
}

impl SessionStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// Return the session bound to `key`, creating its remote context on first contact.
    ///
    /// Concurrent first contacts for one key share a single `create_context`
    /// call. If creation fails the key stays unbound and the next call retries.
    pub async fn resolve(
        &self,
        key: &str,
        provider: &dyn Provider,
    ) -> Result<Session, CheckdocError> {
        let slot = self.slot_for(key);

        let context_id = slot
            .context
            .get_or_try_init(|| async {
                let id = provider.create_context().await?;
                info!("session {key} bound to context {id}");
                Ok::<_, CheckdocError>(id)
            })
            .await?
            .clone();

        Ok(Session {
            key: key.to_string(),
            context_id,
            turn: slot.turn.clone(),
        })
    }

    /// Look up the context bound to `key` without creating one.
    pub fn get(&self, key: &str) -> Option<ContextId> {
        let entries = self.lock_entries();
        let entry = entries.get(key)?;
        if self.policy.is_expired(entry, Instant::now()) {
            return None;
        }
        entry.slot.context.get().cloned()
    }

    /// Number of keys with a bound context.
    pub fn len(&self) -> usize {
        self.lock_entries()
            .values()
            .filter(|e| e.slot.context.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_for(&self, key: &str) -> Arc<Slot> {
        let now = Instant::now();
        let mut entries = self.lock_entries();

        let purged = self.policy.purge_expired(&mut entries, now);
        if purged > 0 {
            debug!("session store: purged {purged} idle sessions");
        }

        if let Some(entry) = entries.get_mut(key) {
            entry.last_used = now;
            return entry.slot.clone();
        }

        for evicted in self.policy.make_room(&mut entries) {
            debug!("session store full, evicted {evicted}");
        }

        let slot = Arc::new(Slot::new());
        entries.insert(
            key.to_string(),
            Entry {
                slot: slot.clone(),
                last_used: now,
            },
        );
        slot
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
