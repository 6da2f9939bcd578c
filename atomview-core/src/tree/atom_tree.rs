//! Atom Node Tree
//!
//! A trie keyed by canonical path tokens. Every node is a potential atom;
//! active nodes are either *roots*, owning a section of the source value,
//! or *descendants*, reading a relative path inside their root's section.
//!
//! # Algorithm
//!
//! - Inserting above existing roots turns the new node into the root of
//!   everything beneath it; the old roots become its descendants.
//! - Removing a root promotes its nearest active descendants back to roots,
//!   handing each its own slice of the old section.
//! - Updating a root reconciles the new section against the old one, so
//!   every descendant whose slice did not change keeps the same snapshot.
//!
//! Nodes live in an arena and reference parents, children and roots by
//! index, which keeps the back-references free of ownership cycles.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::{smallvec, SmallVec};
use tracing::trace;

use crate::error::TreeError;
use crate::ids::PathId;
use crate::path::{canonical, GLOBAL_SELECTOR};
use crate::value::{self, is_index_token, same_opt, Value};

use super::atom::Atom;
use super::node::{Activation, AtomNode, NodeIdx, NodeKind, Role};
use super::AtomLookup;

type NodeList = SmallVec<[NodeIdx; 8]>;

/// Nodes to refresh in one atomize pass, grouped by their root.
type Targets = IndexMap<NodeIdx, SmallVec<[NodeIdx; 2]>>;

/// The path-indexed atom trie.
#[derive(Debug)]
pub struct AtomNodeTree {
    /// Arena slots. Slot 0 is the trie root.
    nodes: Vec<Option<AtomNode>>,

    /// Released slots available for reuse.
    free: Vec<NodeIdx>,

    /// Active node of each canonical path.
    by_path: HashMap<PathId, NodeIdx>,
}

impl Default for AtomNodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomNodeTree {
    /// Create a tree holding only the trie root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(AtomNode::connective("", None))],
            free: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Get a node by index.
    pub fn node(&self, idx: NodeIdx) -> Option<&AtomNode> {
        self.nodes.get(idx.raw()).and_then(Option::as_ref)
    }

    /// Activate the node at `tokens`, creating connective nodes on the way.
    ///
    /// Idempotent for an already active node. A node with an active ancestor
    /// becomes a descendant of that ancestor's root; otherwise it becomes a
    /// root over `source` and adopts every active node beneath it.
    pub fn insert_atom_at(&mut self, path_id: PathId, tokens: &[String], source: &Value) -> NodeIdx {
        debug_assert!(!tokens.is_empty(), "atoms need at least one path token");
        if tokens.is_empty() {
            return NodeIdx::ROOT;
        }

        let mut current = NodeIdx::ROOT;
        let mut nearest_active = None;
        for token in tokens {
            if self.slot(current).is_active() {
                nearest_active = Some(current);
            }
            current = match self.slot(current).children.get(token.as_str()) {
                Some(&child) => child,
                None => self.attach(current, token),
            };
        }

        if self.slot(current).is_active() {
            return current;
        }

        let owner = nearest_active.and_then(|idx| self.slot(idx).root_of(idx));
        let (role, value) = match owner {
            Some(root) => {
                let relative = tokens[self.depth_of(root)..].to_vec();
                let value = self
                    .section(root)
                    .and_then(|section| section.get_path(&relative))
                    .cloned();
                (Role::Descendant { root, relative }, value)
            }
            None => {
                let fresh = source.get_path(tokens).cloned();
                let section = self.graft_roots(current, tokens.len(), fresh);
                (
                    Role::Root {
                        section: section.clone(),
                    },
                    section,
                )
            }
        };

        self.slot_mut(current).active = Some(Activation {
            path_id,
            tokens: tokens.to_vec(),
            atom: Atom::new(value),
            role,
        });
        self.by_path.insert(path_id, current);

        if owner.is_none() {
            let adopted = self.adopt(current, current, tokens.len());
            trace!(path = %canonical(tokens), adopted, "inserted root atom");
        } else {
            trace!(path = %canonical(tokens), "inserted descendant atom");
        }
        current
    }

    /// Exact-match lookup of an active node.
    pub fn find_active_node_at<S: AsRef<str>>(&self, tokens: &[S]) -> Option<NodeIdx> {
        let idx = self.walk(tokens)?;
        self.slot(idx).is_active().then_some(idx)
    }

    /// Kind of the node at `tokens`, active or not.
    pub fn kind_at<S: AsRef<str>>(&self, tokens: &[S]) -> Option<NodeKind> {
        self.walk(tokens).map(|idx| self.slot(idx).kind())
    }

    /// Deactivate the atom of `path_id`.
    ///
    /// Leaf nodes are pruned along with any connective ancestors left
    /// without children. A removed root hands its section to its nearest
    /// active descendants. Returns false when no such atom exists.
    pub fn remove_atom_at(&mut self, path_id: PathId) -> bool {
        let Some(idx) = self.by_path.remove(&path_id) else {
            return false;
        };
        let Some(activation) = self.slot_mut(idx).active.take() else {
            return false;
        };

        if matches!(activation.role, Role::Root { .. }) {
            let promoted = self.promote_descendants(idx);
            trace!(path = %canonical(&activation.tokens), promoted, "removed root atom");
        } else {
            trace!(path = %canonical(&activation.tokens), "removed descendant atom");
        }

        if self.slot(idx).children.is_empty() {
            self.prune(idx);
        }
        true
    }

    /// Write `value` at the atom of `path_id`.
    ///
    /// Copy-on-write along the path inside the owning root's section, then
    /// reconcile against the previous section. Returns the paths whose
    /// snapshot changed.
    pub fn set_value_at(
        &mut self,
        path_id: PathId,
        value: Option<Value>,
    ) -> Result<Vec<PathId>, TreeError> {
        let idx = self
            .by_path
            .get(&path_id)
            .copied()
            .ok_or(TreeError::InactiveNode { path: path_id })?;
        Ok(self.assign(idx, value))
    }

    /// Apply externally changed paths of `source` to the tree.
    ///
    /// Each changed path is routed to the most specific active node it
    /// passes through, or to the topmost active nodes beneath it. Every root
    /// is updated at most once: a single target is written through its own
    /// path, several targets collapse into one refresh of the root section.
    /// The global atom and its descendants are refreshed whenever anything
    /// changed. Returns the paths whose snapshot changed.
    pub fn atomize(&mut self, source: &Value, changed_paths: &[Vec<String>]) -> Vec<PathId> {
        if changed_paths.is_empty() {
            return Vec::new();
        }

        let mut targets = Targets::new();
        for path in changed_paths {
            self.collect_targets(path, &mut targets);
        }
        if let Some(&global) = self.slot(NodeIdx::ROOT).children.get(GLOBAL_SELECTOR) {
            self.collect_topmost(global, &mut targets);
        }

        let mut changed = Vec::new();
        for (root, nodes) in targets {
            let target = if nodes.len() == 1 { nodes[0] } else { root };
            let value = match &self.slot(target).active {
                Some(activation) => source.get_path(&activation.tokens).cloned(),
                None => continue,
            };
            trace!(root = root.raw(), targets = nodes.len(), "atomizing root");
            changed.extend(self.assign(target, value));
        }
        changed
    }

    /// Node of an active path.
    pub fn node_of(&self, path_id: PathId) -> Option<NodeIdx> {
        self.by_path.get(&path_id).copied()
    }

    pub fn atom(&self, path_id: PathId) -> Option<&Atom> {
        self.node(self.node_of(path_id)?)?.atom()
    }

    pub fn atom_mut(&mut self, path_id: PathId) -> Option<&mut Atom> {
        let idx = self.node_of(path_id)?;
        self.nodes
            .get_mut(idx.raw())?
            .as_mut()?
            .active
            .as_mut()
            .map(|activation| &mut activation.atom)
    }

    /// Number of active atoms.
    pub fn atom_count(&self) -> usize {
        self.by_path.len()
    }

    /// Number of live nodes, the trie root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    fn slot(&self, idx: NodeIdx) -> &AtomNode {
        self.node(idx).expect("node index refers to a released slot")
    }

    fn slot_mut(&mut self, idx: NodeIdx) -> &mut AtomNode {
        self.nodes
            .get_mut(idx.raw())
            .and_then(Option::as_mut)
            .expect("node index refers to a released slot")
    }

    fn walk<S: AsRef<str>>(&self, tokens: &[S]) -> Option<NodeIdx> {
        tokens.iter().try_fold(NodeIdx::ROOT, |current, token| {
            self.slot(current).children.get(token.as_ref()).copied()
        })
    }

    fn attach(&mut self, parent: NodeIdx, token: &str) -> NodeIdx {
        let node = AtomNode::connective(token, Some(parent));
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx.raw()] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                NodeIdx::from_raw(self.nodes.len() - 1)
            }
        };
        self.slot_mut(parent).children.insert(token.to_owned(), idx);
        idx
    }

    fn prune(&mut self, idx: NodeIdx) {
        let mut current = idx;
        while current != NodeIdx::ROOT {
            let node = self.slot(current);
            if node.is_active() || !node.children.is_empty() {
                break;
            }
            let Some(parent) = node.parent else {
                break;
            };
            let key = node.key.clone();
            self.nodes[current.raw()] = None;
            self.free.push(current);
            self.slot_mut(parent).children.shift_remove(&key);
            current = parent;
        }
    }

    fn children_of(&self, idx: NodeIdx) -> NodeList {
        self.slot(idx).children.values().copied().collect()
    }

    fn depth_of(&self, idx: NodeIdx) -> usize {
        self.slot(idx)
            .active
            .as_ref()
            .map_or(0, |activation| activation.tokens.len())
    }

    fn section(&self, root: NodeIdx) -> Option<&Value> {
        match self.slot(root).role()? {
            Role::Root { section } => section.as_ref(),
            Role::Descendant { .. } => None,
        }
    }

    /// Carry the sections of the roots under `from` into `section`.
    ///
    /// Slices equal to a former root's section take that section's
    /// reference, so adopted atoms keep their snapshots.
    fn graft_roots(&self, from: NodeIdx, depth: usize, mut section: Option<Value>) -> Option<Value> {
        let mut stack = self.children_of(from);
        while let Some(idx) = stack.pop() {
            let Some(activation) = self.slot(idx).active.as_ref() else {
                stack.extend(self.children_of(idx));
                continue;
            };
            let Role::Root { section: held } = &activation.role else {
                continue;
            };
            let relative = &activation.tokens[depth..];
            let slice = section.as_ref().and_then(|s| s.get_path(relative)).cloned();
            let (kept, _) = value::reconcile_opt(held.as_ref(), slice.clone());
            if kept.is_some() && !same_opt(kept.as_ref(), slice.as_ref()) {
                section = value::with_path(section.as_ref(), relative, kept);
            }
        }
        section
    }

    /// Re-point every active node under `from` at `root`.
    fn adopt(&mut self, from: NodeIdx, root: NodeIdx, root_depth: usize) -> usize {
        let mut stack = self.children_of(from);
        let mut adopted = 0;
        while let Some(idx) = stack.pop() {
            stack.extend(self.children_of(idx));
            if let Some(activation) = self.slot_mut(idx).active.as_mut() {
                activation.role = Role::Descendant {
                    root,
                    relative: activation.tokens[root_depth..].to_vec(),
                };
                adopted += 1;
            }
        }
        adopted
    }

    /// Turn the nearest active nodes under `from` into roots.
    fn promote_descendants(&mut self, from: NodeIdx) -> usize {
        let mut stack = self.children_of(from);
        let mut promoted = 0;
        while let Some(idx) = stack.pop() {
            if !self.slot(idx).is_active() {
                stack.extend(self.children_of(idx));
                continue;
            }
            let depth = match self.slot_mut(idx).active.as_mut() {
                Some(activation) => {
                    activation.role = Role::Root {
                        section: activation.atom.value().cloned(),
                    };
                    activation.tokens.len()
                }
                None => continue,
            };
            self.adopt(idx, idx, depth);
            promoted += 1;
        }
        promoted
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    fn assign(&mut self, idx: NodeIdx, value: Option<Value>) -> Vec<PathId> {
        let (root, section) = match self.slot(idx).role() {
            Some(Role::Root { .. }) => (idx, value),
            Some(Role::Descendant { root, relative }) => {
                let root = *root;
                (root, value::with_path(self.section(root), relative, value))
            }
            None => return Vec::new(),
        };
        self.update_root(root, section)
    }

    fn update_root(&mut self, root: NodeIdx, next: Option<Value>) -> Vec<PathId> {
        let mut changed = Vec::new();

        let section = {
            let Some(activation) = self.slot_mut(root).active.as_mut() else {
                return changed;
            };
            let Role::Root { section } = &mut activation.role else {
                return changed;
            };
            let (next, differs) = value::reconcile_opt(section.as_ref(), next);
            if !differs {
                return changed;
            }
            *section = next.clone();
            activation.atom.replace(next.clone());
            changed.push(activation.path_id);
            next
        };

        let mut stack = self.children_of(root);
        while let Some(idx) = stack.pop() {
            stack.extend(self.children_of(idx));
            let Some(activation) = self.slot_mut(idx).active.as_mut() else {
                continue;
            };
            let Role::Descendant {
                root: owner,
                relative,
            } = &activation.role
            else {
                continue;
            };
            if *owner != root {
                continue;
            }
            let derived = section
                .as_ref()
                .and_then(|s| s.get_path(relative))
                .cloned();
            if !same_opt(activation.atom.value(), derived.as_ref()) {
                activation.atom.replace(derived);
                changed.push(activation.path_id);
            }
        }
        changed
    }

    // ------------------------------------------------------------------
    // Atomize routing
    // ------------------------------------------------------------------

    fn collect_targets(&self, path: &[String], targets: &mut Targets) {
        let mut current = NodeIdx::ROOT;
        let mut deepest = None;

        for token in path {
            // `list.-1` may alias the index being changed.
            if is_index_token(token) && !token.starts_with('-') {
                for (key, &child) in &self.slot(current).children {
                    if key.starts_with('-') && is_index_token(key) {
                        self.collect_topmost(child, targets);
                    }
                }
            }
            match self.slot(current).children.get(token.as_str()) {
                Some(&child) => {
                    current = child;
                    if self.slot(child).is_active() {
                        deepest = Some(child);
                    }
                }
                None => {
                    if let Some(node) = deepest {
                        self.add_target(node, targets);
                    }
                    return;
                }
            }
        }

        match deepest {
            Some(node) => self.add_target(node, targets),
            None => self.collect_topmost(current, targets),
        }
    }

    fn collect_topmost(&self, start: NodeIdx, targets: &mut Targets) {
        let mut stack: NodeList = smallvec![start];
        while let Some(idx) = stack.pop() {
            if self.slot(idx).is_active() {
                self.add_target(idx, targets);
            } else {
                stack.extend(self.children_of(idx));
            }
        }
    }

    fn add_target(&self, idx: NodeIdx, targets: &mut Targets) {
        let Some(root) = self.slot(idx).root_of(idx) else {
            return;
        };
        let entry = targets.entry(root).or_default();
        if !entry.contains(&idx) {
            entry.push(idx);
        }
    }
}

impl AtomLookup for AtomNodeTree {
    fn atom_mut(&mut self, path: PathId) -> Option<&mut Atom> {
        AtomNodeTree::atom_mut(self, path)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathRepository;
    use serde_json::json;

    struct Fixture {
        tree: AtomNodeTree,
        paths: PathRepository,
        source: Value,
    }

    impl Fixture {
        fn new(source: serde_json::Value) -> Self {
            Self {
                tree: AtomNodeTree::new(),
                paths: PathRepository::new(),
                source: Value::from(source),
            }
        }

        fn insert(&mut self, path: &str) -> PathId {
            let id = self.paths.intern(path).canonical;
            let tokens = self.paths.tokens_of(id).unwrap().to_vec();
            self.tree.insert_atom_at(id, &tokens, &self.source);
            id
        }

        fn kind(&self, path: &str) -> Option<NodeKind> {
            self.tree.kind_at(&crate::path::tokenize(path))
        }

        fn value(&self, id: PathId) -> Option<Value> {
            self.tree.atom(id).and_then(|a| a.value().cloned())
        }
    }

    fn changed(paths: &[&[&str]]) -> Vec<Vec<String>> {
        paths
            .iter()
            .map(|p| p.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn first_atom_becomes_root() {
        let mut fx = Fixture::new(json!({"a": {"b": 1}}));
        let id = fx.insert("a.b");

        assert_eq!(fx.kind("a.b"), Some(NodeKind::Root));
        assert_eq!(fx.kind("a"), Some(NodeKind::Connective));
        assert_eq!(fx.value(id), Some(Value::from(1)));
        assert!(fx.tree.find_active_node_at(&["a"]).is_none());
        assert!(fx.tree.find_active_node_at(&["a", "b"]).is_some());
    }

    #[test]
    fn insert_is_idempotent() {
        let mut fx = Fixture::new(json!({"a": 1}));
        fx.insert("a");
        let nodes = fx.tree.node_count();
        let first = fx.tree.find_active_node_at(&["a"]);

        fx.insert("a");
        assert_eq!(fx.tree.node_count(), nodes);
        assert_eq!(fx.tree.find_active_node_at(&["a"]), first);
        assert_eq!(fx.tree.atom_count(), 1);
    }

    #[test]
    fn nested_atom_becomes_descendant() {
        let mut fx = Fixture::new(json!({"a": {"b": {"c": 3}}}));
        fx.insert("a");
        let id = fx.insert("a.b.c");

        assert_eq!(fx.kind("a.b.c"), Some(NodeKind::Descendant));
        assert_eq!(fx.value(id), Some(Value::from(3)));
    }

    #[test]
    fn prefix_insert_takes_over_as_root_and_removal_promotes_back() {
        let mut fx = Fixture::new(json!({"x": {"y": {"z": [1, 2]}}}));
        let deep = fx.insert("x.y.z");
        let before = fx.value(deep).unwrap();
        assert_eq!(fx.kind("x.y.z"), Some(NodeKind::Root));

        let top = fx.insert("x");
        assert_eq!(fx.kind("x"), Some(NodeKind::Root));
        assert_eq!(fx.kind("x.y.z"), Some(NodeKind::Descendant));

        assert!(fx.tree.remove_atom_at(top));
        assert_eq!(fx.kind("x"), Some(NodeKind::Connective));
        assert_eq!(fx.kind("x.y.z"), Some(NodeKind::Root));

        let after = fx.value(deep).unwrap();
        assert!(after.ptr_eq(&before));
    }

    #[test]
    fn prefix_insert_keeps_snapshots_of_adopted_roots() {
        let mut fx = Fixture::new(json!({"a": {"b": {"c": 1}}}));
        let b = fx.insert("a.b");
        let c = fx.insert("a.b.c");
        fx.tree.set_value_at(c, Some(Value::from(2))).unwrap();
        fx.source = Value::from(json!({"a": {"b": {"c": 2}}}));

        let a = fx.insert("a");
        let b_before = fx.value(b).unwrap();
        assert_eq!(fx.kind("a.b"), Some(NodeKind::Descendant));
        assert!(fx.value(a).unwrap().get_path(&["b"]).unwrap().same(&b_before));

        let next = Value::from(json!({"a": {"b": {"c": 2}, "e": 1}}));
        let changed_ids = fx.tree.atomize(&next, &changed(&[&["a", "e"]]));

        assert_eq!(changed_ids, vec![a]);
        assert!(fx.value(b).unwrap().same(&b_before));
        assert_eq!(fx.value(c), Some(Value::from(2)));
    }

    #[test]
    fn promoted_roots_adopt_their_own_descendants() {
        let mut fx = Fixture::new(json!({"a": {"b": {"c": 1, "d": 2}}}));
        let top = fx.insert("a");
        fx.insert("a.b");
        let c = fx.insert("a.b.c");

        fx.tree.remove_atom_at(top);
        assert_eq!(fx.kind("a.b"), Some(NodeKind::Root));
        assert_eq!(fx.kind("a.b.c"), Some(NodeKind::Descendant));

        let changed = fx.tree.set_value_at(c, Some(Value::from(9))).unwrap();
        assert!(changed.contains(&c));
        assert_eq!(fx.value(c), Some(Value::from(9)));
    }

    #[test]
    fn removing_leaf_prunes_connective_ancestors() {
        let mut fx = Fixture::new(json!({"a": {"b": {"c": 1}}}));
        let id = fx.insert("a.b.c");
        assert_eq!(fx.tree.node_count(), 4);

        assert!(fx.tree.remove_atom_at(id));
        assert_eq!(fx.tree.node_count(), 1);
        assert_eq!(fx.tree.atom_count(), 0);
        assert!(!fx.tree.remove_atom_at(id));
    }

    #[test]
    fn pruning_stops_at_branching_ancestor() {
        let mut fx = Fixture::new(json!({"a": {"b": 1, "c": 2}}));
        let b = fx.insert("a.b");
        fx.insert("a.c");

        fx.tree.remove_atom_at(b);
        assert_eq!(fx.kind("a.b"), None);
        assert_eq!(fx.kind("a"), Some(NodeKind::Connective));
        assert_eq!(fx.kind("a.c"), Some(NodeKind::Root));
    }

    #[test]
    fn removing_inner_node_leaves_placeholder() {
        let mut fx = Fixture::new(json!({"a": {"b": 1}}));
        let a = fx.insert("a");
        fx.insert("a.b");

        fx.tree.remove_atom_at(a);
        assert_eq!(fx.kind("a"), Some(NodeKind::Connective));
        assert_eq!(fx.kind("a.b"), Some(NodeKind::Root));
    }

    #[test]
    fn set_value_on_descendant_keeps_sibling_identity() {
        let mut fx = Fixture::new(json!({"a": {"b": {"v": 1}, "c": {"v": 2}}}));
        let a = fx.insert("a");
        let b = fx.insert("a.b");
        let c = fx.insert("a.c");
        let c_before = fx.value(c).unwrap();

        let changed = fx
            .tree
            .set_value_at(b, Some(Value::from(json!({"v": 10}))))
            .unwrap();

        assert!(changed.contains(&a));
        assert!(changed.contains(&b));
        assert!(!changed.contains(&c));
        assert!(fx.value(c).unwrap().ptr_eq(&c_before));
        assert_eq!(fx.value(b), Some(Value::from(json!({"v": 10}))));
    }

    #[test]
    fn equal_value_is_a_no_op() {
        let mut fx = Fixture::new(json!({"a": {"b": [1, 2]}}));
        let a = fx.insert("a");
        let before = fx.value(a).unwrap();

        let changed = fx
            .tree
            .set_value_at(a, Some(Value::from(json!({"b": [1, 2]}))))
            .unwrap();
        assert!(changed.is_empty());
        assert!(fx.value(a).unwrap().ptr_eq(&before));
    }

    #[test]
    fn set_value_on_inactive_path_is_a_contract_violation() {
        let mut fx = Fixture::new(json!({"a": 1}));
        let id = fx.paths.intern("a").canonical;
        assert_eq!(
            fx.tree.set_value_at(id, Some(Value::from(2))),
            Err(TreeError::InactiveNode { path: id })
        );
    }

    #[test]
    fn atomize_updates_only_affected_roots() {
        let mut fx = Fixture::new(json!({"a": {"b": 1, "c": {"d": 2}}}));
        let b = fx.insert("a.b");
        let c = fx.insert("a.c");
        let c_before = fx.value(c).unwrap();

        let next = Value::from(json!({"a": {"b": 5, "c": {"d": 2}}}));
        let changed_ids = fx.tree.atomize(&next, &changed(&[&["a", "b"]]));

        assert_eq!(changed_ids, vec![b]);
        assert_eq!(fx.value(b), Some(Value::from(5)));
        assert!(fx.value(c).unwrap().ptr_eq(&c_before));
    }

    #[test]
    fn atomize_routes_parent_change_to_roots_below() {
        let mut fx = Fixture::new(json!({"a": {"b": 1, "c": 2}}));
        let b = fx.insert("a.b");
        let c = fx.insert("a.c");

        let next = Value::from(json!({"a": {"b": 7, "c": 8}}));
        let changed_ids = fx.tree.atomize(&next, &changed(&[&["a"]]));

        assert!(changed_ids.contains(&b));
        assert!(changed_ids.contains(&c));
        assert_eq!(fx.value(c), Some(Value::from(8)));
    }

    #[test]
    fn atomize_collapses_several_targets_under_one_root() {
        let mut fx = Fixture::new(json!({"a": {"b": 1, "c": 2}}));
        let a = fx.insert("a");
        let b = fx.insert("a.b");
        let c = fx.insert("a.c");

        let next = Value::from(json!({"a": {"b": 3, "c": 4}}));
        let changed_ids = fx
            .tree
            .atomize(&next, &changed(&[&["a", "b"], &["a", "c"]]));

        for id in [a, b, c] {
            assert!(changed_ids.contains(&id));
        }
        assert_eq!(fx.value(b), Some(Value::from(3)));
        assert_eq!(fx.value(c), Some(Value::from(4)));
    }

    #[test]
    fn atomize_refreshes_global_atom() {
        let mut fx = Fixture::new(json!({"a": 1, "b": {"x": 1}}));
        let global = fx.insert(GLOBAL_SELECTOR);

        let next = Value::from(json!({"a": 2, "b": {"x": 1}}));
        let changed_ids = fx.tree.atomize(&next, &changed(&[&["a"]]));

        assert_eq!(changed_ids, vec![global]);
        assert_eq!(fx.value(global), Some(next));
    }

    #[test]
    fn atomize_refreshes_negative_index_aliases() {
        let mut fx = Fixture::new(json!({"list": [1, 2, 3]}));
        let last = fx.insert("list[-1]");

        let next = Value::from(json!({"list": [1, 2, 30]}));
        let changed_ids = fx.tree.atomize(&next, &changed(&[&["list", "2"]]));

        assert_eq!(changed_ids, vec![last]);
        assert_eq!(fx.value(last), Some(Value::from(30)));
    }

    #[test]
    fn atomize_removed_path_clears_snapshot() {
        let mut fx = Fixture::new(json!({"a": {"b": 1}}));
        let b = fx.insert("a.b");

        let next = Value::from(json!({"a": {}}));
        fx.tree.atomize(&next, &changed(&[&["a", "b"]]));
        assert_eq!(fx.value(b), None);
    }
}
