//! Accessor Cache
//!
//! Maps canonical path-set keys to shared [`Accessor`]s and owns everything
//! they observe: the origin value, the atom tree and the path repository.
//!
//! # Lifecycle
//!
//! - `get` resolves the requested paths, reuses or creates the accessor for
//!   that set, and materializes missing atoms from the origin.
//! - `atomize` swaps in a new origin, updates the atoms on the changed paths
//!   and marks every connected accessor outdated.
//! - An accessor is evicted when its last client unlinks or when a sweep
//!   finds it idle past its TTL. Atoms left without connections go with it.

use std::collections::HashMap;
use std::time::Instant;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::config::CacheConfig;
use crate::ids::{AccessorId, ClientId, PathId};
use crate::path::{tokenize, PathRepository, GLOBAL_SELECTOR};
use crate::tree::AtomNodeTree;
use crate::value::Value;

use super::accessor::Accessor;
use super::aging::AgingTable;

/// Response of a `get`, keyed by the caller's path strings.
pub type Response = IndexMap<String, Value>;

/// Shared path-set accessors over one origin value.
#[derive(Debug)]
pub struct AccessorCache {
    config: CacheConfig,
    origin: Value,
    tree: AtomNodeTree,
    repository: PathRepository,

    accessors: HashMap<AccessorId, Accessor>,

    /// Path-set key -> accessor.
    keys: HashMap<String, AccessorId>,

    aging: AgingTable<AccessorId>,

    /// Number of accessors reached through each source id.
    source_users: HashMap<PathId, usize>,
}

impl AccessorCache {
    pub fn new(origin: Value, config: CacheConfig) -> Self {
        Self {
            aging: AgingTable::new(config.accessor_ttl),
            config,
            origin,
            tree: AtomNodeTree::new(),
            repository: PathRepository::new(),
            accessors: HashMap::new(),
            keys: HashMap::new(),
            source_users: HashMap::new(),
        }
    }

    /// The current origin value.
    pub fn origin(&self) -> &Value {
        &self.origin
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read `paths` on behalf of `client`.
    pub fn get<S: AsRef<str>>(&mut self, client: ClientId, paths: &[S]) -> Response {
        self.get_at(client, paths, Instant::now())
    }

    /// Read `paths` on behalf of `client`, aging the accessor from `now`.
    ///
    /// An empty path list reads the whole value under the global selector.
    pub fn get_at<S: AsRef<str>>(&mut self, client: ClientId, paths: &[S], now: Instant) -> Response {
        let requested: SmallVec<[&str; 4]> = if paths.is_empty() {
            SmallVec::from_elem(GLOBAL_SELECTOR, 1)
        } else {
            paths.iter().map(AsRef::as_ref).collect()
        };

        let interned: SmallVec<[_; 4]> = requested
            .iter()
            .map(|path| self.repository.intern(path))
            .collect();
        let mut canonical: Vec<PathId> = interned.iter().map(|ids| ids.canonical).collect();
        canonical.sort_unstable();
        canonical.dedup();
        let key = path_set_key(&canonical);

        let id = match self.keys.get(&key) {
            Some(&id) => {
                self.aging.touch(&id, now);
                id
            }
            None => self.create_accessor(key, canonical, now),
        };

        let Some(accessor) = self.accessors.get_mut(&id) else {
            return Response::new();
        };
        for ids in &interned {
            if accessor.add_source(ids.source) {
                *self.source_users.entry(ids.source).or_insert(0) += 1;
            }
        }
        accessor.add_client(client);

        let value = accessor.refresh_value(&mut self.tree);
        let mut response = Response::with_capacity(requested.len());
        for (path, ids) in requested.iter().zip(&interned) {
            if let Some(snapshot) = value.get(&ids.canonical) {
                response.insert((*path).to_owned(), snapshot.clone());
            }
        }
        response
    }

    fn create_accessor(&mut self, key: String, canonical: Vec<PathId>, now: Instant) -> AccessorId {
        for &path in &canonical {
            if let Some(tokens) = self.repository.tokens_of(path) {
                self.tree.insert_atom_at(path, tokens, &self.origin);
            }
        }
        let accessor = Accessor::new(key.clone(), canonical, self.config.refresh_scan_threshold);
        let id = accessor.id();
        debug!(accessor = %id, key = %key, paths = accessor.paths().len(), "created accessor");

        self.aging.insert(id, now);
        self.keys.insert(key, id);
        self.accessors.insert(id, accessor);
        id
    }

    /// Swap in `source` as the new origin and propagate `changed_paths`.
    ///
    /// Returns the canonical paths whose atom snapshot changed.
    pub fn atomize(&mut self, source: Value, changed_paths: &[Vec<String>]) -> Vec<PathId> {
        if changed_paths.is_empty() {
            return Vec::new();
        }
        self.origin = source;

        let changed = self.tree.atomize(&self.origin, changed_paths);
        for &path in &changed {
            let Some(atom) = self.tree.atom(path) else {
                continue;
            };
            for accessor in atom.connections() {
                if let Some(accessor) = self.accessors.get_mut(&accessor) {
                    accessor.mark_outdated(path);
                }
            }
        }
        debug!(
            paths = changed_paths.len(),
            atoms = changed.len(),
            "atomized changes"
        );
        changed
    }

    /// Disconnect `client` everywhere. Returns the keys of evicted accessors.
    pub fn unlink_client(&mut self, client: ClientId) -> Vec<String> {
        let orphaned: Vec<AccessorId> = self
            .accessors
            .values_mut()
            .filter_map(|accessor| {
                (accessor.remove_client(client) && accessor.client_count() == 0)
                    .then(|| accessor.id())
            })
            .collect();
        orphaned.into_iter().filter_map(|id| self.evict(id)).collect()
    }

    /// Evict every accessor idle past its TTL at `now`.
    pub fn prune(&mut self, now: Instant) -> Vec<String> {
        let expired = self.aging.sweep(now);
        if expired.is_empty() {
            return Vec::new();
        }
        let evicted: Vec<String> = expired
            .into_iter()
            .filter_map(|id| {
                if let Some(accessor) = self.accessors.get_mut(&id) {
                    accessor.clear_clients();
                }
                self.evict(id)
            })
            .collect();
        debug!(evicted = evicted.len(), "swept idle accessors");
        evicted
    }

    /// Sweep against the current instant.
    pub fn tick(&mut self) -> Vec<String> {
        self.prune(Instant::now())
    }

    /// Remove one accessor and whatever only it kept alive.
    ///
    /// Returns its key, or `None` when it was already gone.
    pub fn evict(&mut self, id: AccessorId) -> Option<String> {
        let accessor = self.accessors.remove(&id)?;
        self.aging.remove(&id);
        self.keys.remove(accessor.key());

        for &path in accessor.paths() {
            let unused = match self.tree.atom_mut(path) {
                Some(atom) => {
                    atom.disconnect(id);
                    atom.connection_count() == 0
                }
                None => false,
            };
            if unused {
                self.tree.remove_atom_at(path);
            }
        }

        for source in accessor.sources() {
            let Some(users) = self.source_users.get_mut(&source) else {
                continue;
            };
            *users -= 1;
            if *users == 0 {
                self.source_users.remove(&source);
                self.repository.release(source);
            }
        }

        debug!(accessor = %id, key = %accessor.key(), "evicted accessor");
        Some(accessor.key().to_owned())
    }

    /// Number of live accessors.
    pub fn accessor_count(&self) -> usize {
        self.accessors.len()
    }

    /// Number of active atoms.
    pub fn atom_count(&self) -> usize {
        self.tree.atom_count()
    }

    /// Whether an atom is active for `path` in any notation.
    pub fn has_atom(&self, path: &str) -> bool {
        self.tree.find_active_node_at(&tokenize(path)).is_some()
    }

    /// Accessor serving `paths`, if one exists.
    pub fn accessor_for<S: AsRef<str>>(&self, paths: &[S]) -> Option<&Accessor> {
        let mut canonical = paths
            .iter()
            .map(|path| self.repository.find_canonical(path.as_ref()))
            .collect::<Option<Vec<_>>>()?;
        if canonical.is_empty() {
            canonical.push(self.repository.find_canonical(GLOBAL_SELECTOR)?);
        }
        canonical.sort_unstable();
        canonical.dedup();
        let id = self.keys.get(&path_set_key(&canonical))?;
        self.accessors.get(id)
    }

    pub fn tree(&self) -> &AtomNodeTree {
        &self.tree
    }

    pub fn repository(&self) -> &PathRepository {
        &self.repository
    }
}

fn path_set_key(paths: &[PathId]) -> String {
    paths
        .iter()
        .map(PathId::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn cache(value: serde_json::Value) -> AccessorCache {
        AccessorCache::new(Value::from(value), CacheConfig::default())
    }

    fn tokens(paths: &[&str]) -> Vec<Vec<String>> {
        paths.iter().map(|path| tokenize(path)).collect()
    }

    #[test]
    fn get_returns_values_under_caller_strings() {
        let mut cache = cache(json!({"a": {"b": 1, "c": [10, 20]}}));
        let client = ClientId::new();

        let response = cache.get(client, &["a.b", "a.c[1]"]);
        assert_eq!(response["a.b"], Value::from(1));
        assert_eq!(response["a.c[1]"], Value::from(20));
        assert_eq!(cache.accessor_count(), 1);
        assert_eq!(cache.atom_count(), 2);
    }

    #[test]
    fn empty_path_list_reads_the_whole_value() {
        let mut cache = cache(json!({"a": 1}));
        let response = cache.get::<&str>(ClientId::new(), &[]);
        assert_eq!(response[GLOBAL_SELECTOR], Value::from(json!({"a": 1})));
    }

    #[test]
    fn missing_paths_are_omitted() {
        let mut cache = cache(json!({"a": 1}));
        let response = cache.get(ClientId::new(), &["a", "nope.deeper"]);
        assert_eq!(response.len(), 1);
        assert!(response.contains_key("a"));
    }

    #[test]
    fn same_path_set_shares_one_accessor() {
        let mut cache = cache(json!({"a": 1, "b": 2}));
        let first = ClientId::new();
        let second = ClientId::new();

        cache.get(first, &["a", "b"]);
        cache.get(second, &["b", "a", "a"]);
        assert_eq!(cache.accessor_count(), 1);

        let accessor = cache.accessor_for(&["a", "b"]).unwrap();
        assert!(accessor.has_client(first));
        assert!(accessor.has_client(second));
    }

    #[test]
    fn equivalent_notations_share_one_accessor() {
        let mut cache = cache(json!({"a": [{"b": 1}]}));
        cache.get(ClientId::new(), &["a[0].b"]);
        let response = cache.get(ClientId::new(), &["a.0.b"]);

        assert_eq!(response["a.0.b"], Value::from(1));
        assert_eq!(cache.accessor_count(), 1);
        assert_eq!(cache.repository().source_count(), 2);
        assert_eq!(cache.repository().canonical_count(), 1);
    }

    #[test]
    fn atomize_marks_connected_accessors_outdated() {
        let mut cache = cache(json!({"a": {"b": 1, "c": 2}}));
        let client = ClientId::new();
        let before = cache.get(client, &["a.c"])["a.c"].clone();
        cache.get(client, &["a.b"]);

        let next = Value::from(json!({"a": {"b": 5, "c": 2}}));
        let changed = cache.atomize(next, &tokens(&["a.b"]));
        assert_eq!(changed.len(), 1);
        assert!(cache.accessor_for(&["a.b"]).unwrap().is_outdated());
        assert!(!cache.accessor_for(&["a.c"]).unwrap().is_outdated());

        assert_eq!(cache.get(client, &["a.b"])["a.b"], Value::from(5));
        assert!(cache.get(client, &["a.c"])["a.c"].same(&before));
    }

    #[test]
    fn atomize_without_changes_keeps_the_origin() {
        let mut cache = cache(json!({"a": 1}));
        let changed = cache.atomize(Value::from(json!({"a": 2})), &[]);
        assert!(changed.is_empty());
        assert_eq!(cache.origin(), &Value::from(json!({"a": 1})));
    }

    #[test]
    fn unlinking_the_last_client_evicts_accessor_and_atoms() {
        let mut cache = cache(json!({"a": 1, "b": 2}));
        let alice = ClientId::new();
        let bob = ClientId::new();

        cache.get(alice, &["a"]);
        cache.get(bob, &["a"]);
        cache.get(bob, &["b"]);

        assert!(cache.unlink_client(alice).is_empty());
        assert_eq!(cache.accessor_count(), 2);

        let evicted = cache.unlink_client(bob);
        assert_eq!(evicted.len(), 2);
        assert_eq!(cache.accessor_count(), 0);
        assert_eq!(cache.atom_count(), 0);
        assert_eq!(cache.repository().source_count(), 0);
        assert!(!cache.has_atom("a"));
    }

    #[test]
    fn shared_atoms_survive_partial_eviction() {
        let mut cache = cache(json!({"a": 1, "b": 2}));
        let alice = ClientId::new();
        let bob = ClientId::new();

        cache.get(alice, &["a"]);
        cache.get(bob, &["a", "b"]);
        cache.unlink_client(bob);

        assert!(cache.has_atom("a"));
        assert!(!cache.has_atom("b"));
        assert_eq!(cache.get(alice, &["a"])["a"], Value::from(1));
    }

    #[test]
    fn sweep_evicts_idle_accessors() {
        let ttl = Duration::from_secs(60);
        let mut cache = AccessorCache::new(
            Value::from(json!({"a": 1, "b": 2})),
            CacheConfig::default().with_accessor_ttl(ttl),
        );
        let client = ClientId::new();
        let start = Instant::now();

        cache.get_at(client, &["a"], start);
        cache.get_at(client, &["b"], start);
        cache.get_at(client, &["a"], start + Duration::from_secs(30));

        let evicted = cache.prune(start + Duration::from_secs(61));
        assert_eq!(evicted.len(), 1);
        assert!(cache.has_atom("a"));
        assert!(!cache.has_atom("b"));

        assert!(cache.prune(start + Duration::from_secs(61)).is_empty());
    }

    #[test]
    fn unlinking_an_unknown_client_is_a_no_op() {
        let mut cache = cache(json!({"a": 1}));
        cache.get(ClientId::new(), &["a"]);
        assert!(cache.unlink_client(ClientId::new()).is_empty());
        assert_eq!(cache.accessor_count(), 1);
    }
}
