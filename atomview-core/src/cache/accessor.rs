//! Accessor Implementation
//!
//! An Accessor is a deduplicated set of canonical paths shared by every
//! client that asked for the same set. It keeps the last computed response
//! and the backlog of paths invalidated since then.
//!
//! # How Accessors Refresh
//!
//! 1. Atoms whose snapshot changed mark their connected accessors outdated.
//!
//! 2. On the next read, an accessor with an empty backlog returns its
//!    cached response untouched.
//!
//! 3. Otherwise it pulls fresh snapshots for the outdated paths only,
//!    connecting itself to each atom on the way.
//!
//! Like a memo, the work is lazy: an accessor nobody reads never refreshes.

use std::collections::HashMap;

use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::ids::{AccessorId, ClientId, PathId};
use crate::tree::AtomLookup;
use crate::value::Value;

/// A shared path-set subscription.
#[derive(Debug)]
pub struct Accessor {
    id: AccessorId,

    /// Cache key of the path set.
    key: String,

    /// Sorted, deduplicated canonical paths.
    paths: Vec<PathId>,

    /// Source ids clients used to reach this accessor.
    sources: IndexSet<PathId>,

    clients: IndexSet<ClientId>,

    /// Last computed response.
    value: HashMap<PathId, Value>,

    /// Paths invalidated since the last refresh, each queued once.
    outdated: IndexSet<PathId>,

    scan_threshold: usize,
}

impl Accessor {
    /// Create an accessor whose every path is outdated.
    pub fn new(key: impl Into<String>, mut paths: Vec<PathId>, scan_threshold: usize) -> Self {
        paths.sort_unstable();
        paths.dedup();
        Self {
            id: AccessorId::next(),
            key: key.into(),
            outdated: paths.iter().copied().collect(),
            paths,
            sources: IndexSet::new(),
            clients: IndexSet::new(),
            value: HashMap::new(),
            scan_threshold,
        }
    }

    pub fn id(&self) -> AccessorId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn paths(&self) -> &[PathId] {
        &self.paths
    }

    /// The last computed response, possibly stale.
    pub fn value(&self) -> &HashMap<PathId, Value> {
        &self.value
    }

    pub fn is_outdated(&self) -> bool {
        !self.outdated.is_empty()
    }

    /// Queue a path for the next refresh.
    pub fn mark_outdated(&mut self, path: PathId) {
        self.outdated.insert(path);
    }

    /// Bring the response up to date and return it.
    pub fn refresh_value<L>(&mut self, atoms: &mut L) -> &HashMap<PathId, Value>
    where
        L: AtomLookup + ?Sized,
    {
        if self.outdated.is_empty() {
            return &self.value;
        }

        let changed = std::mem::take(&mut self.outdated);
        if changed.len() >= self.paths.len() {
            for &path in &self.paths {
                pull(atoms, self.id, path, &mut self.value);
            }
        } else if self.paths.len() > self.scan_threshold {
            let due: SmallVec<[PathId; 8]> = changed
                .iter()
                .copied()
                .filter(|path| self.paths.binary_search(path).is_ok())
                .collect();
            for path in due {
                pull(atoms, self.id, path, &mut self.value);
            }
        } else {
            for &path in &changed {
                pull(atoms, self.id, path, &mut self.value);
            }
        }
        &self.value
    }

    /// Add a client. Returns false if it was already present.
    pub fn add_client(&mut self, client: ClientId) -> bool {
        self.clients.insert(client)
    }

    /// Remove a client. Returns false if it was not present.
    pub fn remove_client(&mut self, client: ClientId) -> bool {
        self.clients.shift_remove(&client)
    }

    pub fn has_client(&self, client: ClientId) -> bool {
        self.clients.contains(&client)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Disconnect every client.
    pub fn clear_clients(&mut self) {
        self.clients.clear();
    }

    pub(crate) fn add_source(&mut self, source: PathId) -> bool {
        self.sources.insert(source)
    }

    pub(crate) fn sources(&self) -> impl Iterator<Item = PathId> + '_ {
        self.sources.iter().copied()
    }
}

/// Copy one atom's snapshot into `value`, connecting `id` to the atom.
/// Paths without an atom keep whatever the response held before.
fn pull<L>(atoms: &mut L, id: AccessorId, path: PathId, value: &mut HashMap<PathId, Value>)
where
    L: AtomLookup + ?Sized,
{
    let Some(atom) = atoms.atom_mut(path) else {
        return;
    };
    atom.connect(id);
    match atom.value() {
        Some(snapshot) => {
            value.insert(path, snapshot.clone());
        }
        None => {
            value.remove(&path);
        }
    }
}
