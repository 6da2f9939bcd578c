//! Store
//!
//! The public entry point: one origin value, one accessor cache, and the
//! patch engine wired in between. [`SharedStore`] wraps a store in a single
//! coarse lock for hosts that share it across threads.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{AccessorCache, Response};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::ids::ClientId;
use crate::patch::{self, ChangedPath, Changes};
use crate::value::Value;

/// An observable value with a shared accessor cache.
#[derive(Debug)]
pub struct Store {
    cache: AccessorCache,
}

impl Store {
    /// Create a store over `root` with the default configuration.
    pub fn new(root: impl Into<Value>) -> Self {
        Self::with_config(root, CacheConfig::default())
    }

    pub fn with_config(root: impl Into<Value>, config: CacheConfig) -> Self {
        Self {
            cache: AccessorCache::new(root.into(), config),
        }
    }

    /// The current root value.
    pub fn value(&self) -> &Value {
        self.cache.origin()
    }

    /// Read `paths` for `client`. An empty list reads the whole value.
    pub fn get<S: AsRef<str>>(&mut self, client: ClientId, paths: &[S]) -> Response {
        self.cache.get(client, paths)
    }

    /// [`Store::get`] with an explicit clock.
    pub fn get_at<S: AsRef<str>>(&mut self, client: ClientId, paths: &[S], now: Instant) -> Response {
        self.cache.get_at(client, paths, now)
    }

    /// Apply `changes` and return the changed paths.
    pub fn set(&mut self, changes: impl Into<Changes>) -> Vec<ChangedPath> {
        self.set_with(changes, |_, _| {})
    }

    /// Apply `changes`, then call `on_complete` with the payload and the
    /// changed paths if anything changed.
    ///
    /// Accessors observe the update before the callback runs.
    pub fn set_with<F>(&mut self, changes: impl Into<Changes>, on_complete: F) -> Vec<ChangedPath>
    where
        F: FnOnce(&Changes, &[ChangedPath]),
    {
        let changes = changes.into();
        let applied = patch::apply(self.cache.origin(), &changes);
        if !applied.is_changed() {
            return Vec::new();
        }

        let atoms = self.cache.atomize(applied.value, &applied.changed);
        debug!(paths = applied.changed.len(), atoms = atoms.len(), "store updated");
        on_complete(&changes, &applied.changed);
        applied.changed
    }

    /// Parse a textual JSON payload and apply it.
    pub fn set_json(&mut self, payload: &str) -> Result<Vec<ChangedPath>> {
        let changes = Changes::from_json_str(payload)?;
        Ok(self.set(changes))
    }

    /// Release everything held only for `client`.
    pub fn unlink_client(&mut self, client: ClientId) -> Vec<String> {
        self.cache.unlink_client(client)
    }

    /// Evict accessors idle past their TTL at `now`.
    pub fn prune(&mut self, now: Instant) -> Vec<String> {
        self.cache.prune(now)
    }

    pub fn tick(&mut self) -> Vec<String> {
        self.cache.tick()
    }

    pub fn cache(&self) -> &AccessorCache {
        &self.cache
    }
}

/// A [`Store`] behind one mutex.
///
/// Tree edits and value propagation are not safe to interleave, so every
/// operation holds the lock for its whole duration.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Store>>,
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Snapshot of the current root value.
    pub fn value(&self) -> Value {
        self.inner.lock().value().clone()
    }

    pub fn get<S: AsRef<str>>(&self, client: ClientId, paths: &[S]) -> Response {
        self.inner.lock().get(client, paths)
    }

    pub fn set(&self, changes: impl Into<Changes>) -> Vec<ChangedPath> {
        self.inner.lock().set(changes)
    }

    /// The callback runs after the lock is released.
    pub fn set_with<F>(&self, changes: impl Into<Changes>, on_complete: F) -> Vec<ChangedPath>
    where
        F: FnOnce(&Changes, &[ChangedPath]),
    {
        let changes = changes.into();
        let changed = self.inner.lock().set(changes.clone());
        if !changed.is_empty() {
            on_complete(&changes, &changed);
        }
        changed
    }

    pub fn unlink_client(&self, client: ClientId) -> Vec<String> {
        self.inner.lock().unlink_client(client)
    }

    pub fn tick(&self) -> Vec<String> {
        self.inner.lock().tick()
    }

    /// Run `f` with exclusive access to the store.
    pub fn with<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl From<Store> for SharedStore {
    fn from(store: Store) -> Self {
        Self::new(store)
    }
}
