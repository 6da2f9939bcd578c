//! Aging Table
//!
//! Insertion-ordered entries with a per-entry time to live. Touching an
//! entry moves it to the back and extends its deadline; a sweep drains
//! every entry whose deadline has passed.
//!
//! The table never runs timers of its own. Whoever owns it decides when to
//! sweep and passes in the current instant.

use std::hash::Hash;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy)]
struct Entry {
    ttl: Duration,
    deadline: Instant,
}

/// TTL table keyed by `K`.
#[derive(Debug)]
pub struct AgingTable<K> {
    default_ttl: Duration,
    entries: IndexMap<K, Entry>,
}

impl<K> AgingTable<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: IndexMap::new(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Insert `key` with the default TTL.
    pub fn insert(&mut self, key: K, now: Instant) {
        self.insert_with_ttl(key, self.default_ttl, now);
    }

    /// Insert `key` with its own TTL. Re-inserting moves it to the back.
    pub fn insert_with_ttl(&mut self, key: K, ttl: Duration, now: Instant) {
        self.entries.shift_remove(&key);
        self.entries.insert(
            key,
            Entry {
                ttl,
                deadline: now + ttl,
            },
        );
    }

    /// Refresh an entry, keeping its TTL. Returns false for unknown keys.
    pub fn touch(&mut self, key: &K, now: Instant) -> bool {
        match self.entries.shift_remove(key) {
            Some(entry) => {
                self.insert_with_ttl(key.clone(), entry.ttl, now);
                true
            }
            None => false,
        }
    }

    /// Remove an entry. Absent keys are ignored.
    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Drain every entry whose deadline is at or before `now`, oldest first.
    pub fn sweep(&mut self, now: Instant) -> Vec<K> {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.shift_remove(key);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
