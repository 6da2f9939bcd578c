//! Atom Implementation
//!
//! An Atom is the smallest observable cell: one immutable snapshot plus the
//! set of accessors connected to it. The snapshot is swapped, never mutated,
//! so a reader holding a previous snapshot never observes a torn value.

use indexmap::IndexSet;

use crate::ids::AccessorId;
use crate::value::Value;

/// An observable snapshot cell.
#[derive(Debug, Clone, Default)]
pub struct Atom {
    /// Current snapshot. `None` when the path does not exist in the value.
    value: Option<Value>,

    /// Accessors reading this atom.
    connections: IndexSet<AccessorId>,
}

impl Atom {
    pub fn new(value: Option<Value>) -> Self {
        Self {
            value,
            connections: IndexSet::new(),
        }
    }

    /// The current snapshot.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Swap in a new snapshot, returning the previous one.
    pub fn replace(&mut self, value: Option<Value>) -> Option<Value> {
        std::mem::replace(&mut self.value, value)
    }

    /// Connect an accessor. Returns false if it was already connected.
    pub fn connect(&mut self, accessor: AccessorId) -> bool {
        self.connections.insert(accessor)
    }

    /// Disconnect an accessor. Returns false if it was not connected.
    pub fn disconnect(&mut self, accessor: AccessorId) -> bool {
        self.connections.shift_remove(&accessor)
    }

    pub fn is_connected(&self, accessor: AccessorId) -> bool {
        self.connections.contains(&accessor)
    }

    pub fn connections(&self) -> impl Iterator<Item = AccessorId> + '_ {
        self.connections.iter().copied()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
