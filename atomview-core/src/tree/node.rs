//! Atom Nodes
//!
//! This module defines the trie nodes that live in the atom tree arena.

use indexmap::IndexMap;

use crate::ids::PathId;
use crate::value::Value;

use super::atom::Atom;

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIdx(usize);

impl NodeIdx {
    /// The permanent trie root. It is never active.
    pub const ROOT: NodeIdx = NodeIdx(0);

    pub(crate) fn from_raw(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw arena slot.
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// What a node currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A placeholder on the way to deeper nodes. Holds no atom.
    Connective,

    /// An active node owning the authoritative section for its subtree.
    Root,

    /// An active node deriving its value from its nearest root ancestor.
    Descendant,
}

/// How an active node obtains its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    /// Owns a section of the source value.
    Root { section: Option<Value> },

    /// Reads `relative` inside the section of `root`.
    Descendant { root: NodeIdx, relative: Vec<String> },
}

/// State carried by an active node.
#[derive(Debug)]
pub struct Activation {
    pub(crate) path_id: PathId,
    /// Full canonical tokens of the node.
    pub(crate) tokens: Vec<String>,
    pub(crate) atom: Atom,
    pub(crate) role: Role,
}

/// A node in the atom trie.
#[derive(Debug)]
pub struct AtomNode {
    /// Last path token.
    pub(crate) key: String,

    pub(crate) parent: Option<NodeIdx>,

    pub(crate) children: IndexMap<String, NodeIdx>,

    /// Present while the node is active.
    pub(crate) active: Option<Activation>,
}

impl AtomNode {
    /// Create a connective node.
    pub fn connective(key: impl Into<String>, parent: Option<NodeIdx>) -> Self {
        Self {
            key: key.into(),
            parent,
            children: IndexMap::new(),
            active: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn parent(&self) -> Option<NodeIdx> {
        self.parent
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn kind(&self) -> NodeKind {
        match &self.active {
            None => NodeKind::Connective,
            Some(Activation {
                role: Role::Root { .. },
                ..
            }) => NodeKind::Root,
            Some(_) => NodeKind::Descendant,
        }
    }

    pub fn atom(&self) -> Option<&Atom> {
        self.active.as_ref().map(|a| &a.atom)
    }

    pub fn role(&self) -> Option<&Role> {
        self.active.as_ref().map(|a| &a.role)
    }

    /// The root this node reports to, given its own index.
    pub fn root_of(&self, own: NodeIdx) -> Option<NodeIdx> {
        match self.role()? {
            Role::Root { .. } => Some(own),
            Role::Descendant { root, .. } => Some(*root),
        }
    }
}
