//! Conversation registry
//!
//! Maps a [`ConversationKey`] to the backend's conversation id for the lifetime of
//! the process. Growth is bounded by an LRU capacity and an idle TTL, both injected
//! from configuration. Reads refresh recency and TTL, so an active conversation
//! never expires mid-use.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::key::ConversationKey;
use crate::routes::metrics::{record_registry_eviction, record_registry_update};

/// Lifecycle policy for registry entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryPolicy {
    /// Maximum number of entries; the least recently used is evicted beyond it
    pub max_entries: usize,
    /// Idle expiry, `None` keeps entries until evicted by capacity
    pub ttl: Option<Duration>,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

struct Entry {
    conversation_id: String,
    tick: u64,
    touched_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Recency order: lowest tick is least recently used
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.tick);
        }
    }

    /// Drop expired entries from the cold end of the recency order
    fn purge_expired(&mut self, ttl: Duration, now: Instant) {
        while let Some((&tick, key)) = self.recency.first_key_value() {
            let expired = self
                .entries
                .get(key)
                .map(|e| now.duration_since(e.touched_at) > ttl)
                .unwrap_or(true);
            if !expired {
                break;
            }
            if let Some(key) = self.recency.remove(&tick) {
                self.entries.remove(&key);
                record_registry_eviction("expired");
            }
        }
    }
}

/// Process-lifetime store of `conversation key -> backend conversation id`
pub struct ConversationRegistry {
    inner: Mutex<Inner>,
    policy: RegistryPolicy,
}

impl ConversationRegistry {
    /// Create a registry with the given lifecycle policy
    pub fn new(policy: RegistryPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Entries stay consistent even if a holder panicked mid-operation.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the backend conversation id for a key
    pub fn get(&self, key: &ConversationKey) -> Option<String> {
        let now = Instant::now();
        let mut inner = self.lock();

        let ttl = self.policy.ttl;
        let (old_tick, expired) = match inner.entries.get(key.as_str()) {
            Some(entry) => (
                entry.tick,
                ttl.map(|ttl| now.duration_since(entry.touched_at) > ttl)
                    .unwrap_or(false),
            ),
            None => {
                debug!(key = %key, "Conversation registry miss");
                return None;
            }
        };

        if expired {
            inner.remove(key.as_str());
            record_registry_eviction("expired");
            debug!(key = %key, "Conversation registry entry expired");
            return None;
        }

        let tick = inner.bump();
        inner.recency.remove(&old_tick);
        inner.recency.insert(tick, key.as_str().to_string());
        let entry = inner.entries.get_mut(key.as_str())?;
        entry.tick = tick;
        entry.touched_at = now;

        debug!(key = %key, conversation_id = %entry.conversation_id, "Conversation registry hit");
        Some(entry.conversation_id.clone())
    }

    /// Associate a backend conversation id with a key, overwriting any previous id
    pub fn set(&self, key: &ConversationKey, conversation_id: &str) {
        let now = Instant::now();
        let mut inner = self.lock();

        if let Some(ttl) = self.policy.ttl {
            inner.purge_expired(ttl, now);
        }

        let previous = inner
            .entries
            .get(key.as_str())
            .map(|e| e.conversation_id.clone());
        inner.remove(key.as_str());

        while inner.entries.len() >= self.policy.max_entries.max(1) {
            let Some((_, lru_key)) = inner.recency.pop_first() else {
                break;
            };
            inner.entries.remove(&lru_key);
            record_registry_eviction("capacity");
        }

        let tick = inner.bump();
        inner.recency.insert(tick, key.as_str().to_string());
        inner.entries.insert(
            key.as_str().to_string(),
            Entry {
                conversation_id: conversation_id.to_string(),
                tick,
                touched_at: now,
            },
        );

        if previous.as_deref() != Some(conversation_id) {
            record_registry_update();
            debug!(
                key = %key,
                conversation_id = %conversation_id,
                previous = ?previous,
                "Conversation registry updated"
            );
        }
    }

    /// Number of tracked conversations (including not yet purged expired ones)
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new(RegistryPolicy::default())
    }
}
