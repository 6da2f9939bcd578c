//! Atom Tree
//!
//! This module implements the path-indexed atom tree that holds every
//! observed slice of the root value.
//!
//! # Overview
//!
//! The tree is a trie over canonical path tokens. A node becomes *active*
//! when some accessor observes its path; it then carries an [`Atom`].
//!
//! - Root atoms own a section of the source value.
//! - Descendant atoms read a relative path inside their nearest root.
//! - Connective nodes only exist to reach deeper nodes.
//!
//! Every active node belongs to exactly one root: itself or an ancestor.
//! This keeps updates cheap: a change is applied once per root and then
//! fanned out to descendants, and every subtree that did not change keeps
//! its snapshot identity.

mod atom;
mod atom_tree;
mod node;

pub use atom::Atom;
pub use atom_tree::AtomNodeTree;
pub use node::{AtomNode, NodeIdx, NodeKind, Role};

use crate::ids::PathId;

/// Access to atoms by canonical path.
///
/// Accessors pull snapshots and register connections through this seam, so
/// they never hold references into the tree.
pub trait AtomLookup {
    /// Get the atom of an active path.
    fn atom_mut(&mut self, path: PathId) -> Option<&mut Atom>;
}
