//! Patch Engine
//!
//! Applies [`Changes`] to a [`Value`] and reports exactly which paths changed.
//!
//! # Algorithm
//!
//! The engine walks the payload and the target in parallel. Every step
//! returns `Some(new)` when the slice under it changed and `None` otherwise,
//! so unchanged subtrees keep their identity and a no-op payload allocates
//! nothing.
//!
//! - Composite onto composite merges recursively. Arrays are resized to the
//!   incoming length; an index-keyed map updates single elements.
//! - Anything else replaces the slice. The replacement is built without
//!   recording its inner paths; only the replaced path is reported.
//! - Tags run before the fields of their map, in payload order.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::path::GLOBAL_SELECTOR;
use crate::value::{is_index_token, reconcile, resolve_index, resolve_signed, Map, Value};

use super::payload::{Changes, Patch};
use super::tag::{SetValue, Tag, EMPTY_SELECTOR};

/// Tokens of a changed path, relative to the root.
pub type ChangedPath = Vec<String>;

/// Result of applying changes.
#[derive(Debug, Clone)]
pub struct Applied {
    /// The updated value. Shares every unchanged subtree with the input.
    pub value: Value,
    /// Changed paths, deduplicated in first-seen order.
    pub changed: Vec<ChangedPath>,
}

impl Applied {
    pub fn is_changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Apply `changes` to `target`.
pub fn apply(target: &Value, changes: &Changes) -> Applied {
    let mut engine = Engine::default();
    let mut current = target.clone();
    for patch in changes.patches() {
        if let Some(next) = engine.apply_root(&current, patch) {
            current = next;
        }
    }
    Applied {
        value: current,
        changed: engine.finish(),
    }
}

/// Apply `changes` to `target`, then hand the payload and the changed paths
/// to `on_complete` if anything changed.
pub fn apply_with<F>(target: &Value, changes: &Changes, on_complete: F) -> Applied
where
    F: FnOnce(&Changes, &[ChangedPath]),
{
    let applied = apply(target, changes);
    if applied.is_changed() {
        debug!(paths = applied.changed.len(), "patch applied");
        on_complete(changes, &applied.changed);
    }
    applied
}

#[derive(Default)]
struct Engine {
    /// Current path, starting at the synthetic wrapper key.
    path: Vec<String>,
    changed: IndexSet<ChangedPath>,
    /// Recording is suppressed while building replacements.
    muted: usize,
}

impl Engine {
    fn apply_root(&mut self, root: &Value, patch: &Patch) -> Option<Value> {
        self.path.clear();
        self.path.push(EMPTY_SELECTOR.to_owned());

        let global = match patch {
            Patch::Map { fields, .. } => fields.get(GLOBAL_SELECTOR),
            _ => None,
        };
        let Some(global) = global else {
            return self.merge(Some(root), patch);
        };

        let replaced = self.merge(Some(root), global);
        let Some(rest) = without_global(patch) else {
            return replaced;
        };
        let current = replaced.as_ref().unwrap_or(root);
        self.merge(Some(current), &rest).or(replaced)
    }

    fn finish(self) -> Vec<ChangedPath> {
        self.changed.into_iter().collect()
    }

    fn record(&mut self) {
        if self.muted == 0 {
            self.changed.insert(self.path[1..].to_vec());
        }
    }

    fn record_child(&mut self, key: &str) {
        self.path.push(key.to_owned());
        self.record();
        self.path.pop();
    }

    /// Build a fresh value from `patch` without recording inner paths.
    fn build(&mut self, base: Option<&Value>, patch: &Patch) -> Option<Value> {
        self.muted += 1;
        let value = self.merge(base, patch);
        self.muted -= 1;
        value
    }

    fn merge(&mut self, target: Option<&Value>, patch: &Patch) -> Option<Value> {
        match patch {
            Patch::Scalar(value) => self.assign(target, value.clone()),
            Patch::List(items) => self.merge_list(target, items),
            Patch::Map { tags, fields } => {
                let mut current: Option<Value> = None;
                for tag in tags {
                    let base = current.as_ref().or(target);
                    if let Some(next) = self.apply_tag(base, tag) {
                        current = Some(next);
                    }
                }
                if !fields.is_empty() || tags.is_empty() {
                    let base = current.as_ref().or(target);
                    if let Some(next) = self.merge_fields(base, fields) {
                        current = Some(next);
                    }
                }
                current
            }
        }
    }

    /// Whole-slice assignment. Equal values are a no-op; otherwise equal
    /// subtrees of `value` are rewritten to the target's references.
    fn assign(&mut self, target: Option<&Value>, value: Value) -> Option<Value> {
        let next = match target {
            Some(current) => {
                let (next, changed) = reconcile(current, value);
                if !changed {
                    return None;
                }
                next
            }
            None => value,
        };
        self.record();
        Some(next)
    }

    fn merge_list(&mut self, target: Option<&Value>, items: &[Patch]) -> Option<Value> {
        let Some(Value::Array(existing)) = target else {
            let built: Vec<Value> = items
                .iter()
                .map(|item| self.build(None, item).unwrap_or_default())
                .collect();
            return self.assign(target, Value::array(built));
        };

        let resized = existing.len() != items.len();
        let mut next: Option<Vec<Value>> = None;
        for (index, item) in items.iter().enumerate() {
            self.path.push(index.to_string());
            let merged = self.merge(existing.get(index), item);
            self.path.pop();
            match merged {
                Some(value) => {
                    let next = next.get_or_insert_with(|| existing.to_vec());
                    if index < next.len() {
                        next[index] = value;
                    } else {
                        next.push(value);
                    }
                }
                None if index >= existing.len() => {
                    next.get_or_insert_with(|| existing.to_vec()).push(Value::Null);
                }
                None => {}
            }
        }

        if !resized && next.is_none() {
            return None;
        }
        let mut next = next.unwrap_or_else(|| existing.to_vec());
        if resized {
            next.truncate(items.len());
            self.record();
        }
        Some(Value::array(next))
    }

    fn merge_fields(
        &mut self,
        target: Option<&Value>,
        fields: &IndexMap<String, Patch>,
    ) -> Option<Value> {
        match target {
            Some(Value::Object(map)) => {
                let mut next = None;
                for (key, patch) in fields {
                    self.path.push(key.clone());
                    let merged = self.merge(map.get(key), patch);
                    self.path.pop();
                    if let Some(value) = merged {
                        next.get_or_insert_with(|| (**map).clone())
                            .insert(key.clone(), value);
                    }
                }
                next.map(Value::from)
            }
            Some(Value::Array(items)) if fields.keys().all(|key| is_index_token(key)) => {
                let mut next: Option<Vec<Value>> = None;
                let mut resized = false;
                for (key, patch) in fields {
                    let len = next.as_ref().map_or(items.len(), Vec::len);
                    let Some(index) = resolve_index(key, len) else {
                        continue;
                    };
                    let current = next.as_ref().map_or(items.as_slice(), Vec::as_slice);
                    self.path.push(index.to_string());
                    let merged = self.merge(current.get(index), patch);
                    self.path.pop();
                    if let Some(value) = merged {
                        let next = next.get_or_insert_with(|| items.to_vec());
                        if index >= next.len() {
                            next.resize(index + 1, Value::Null);
                            resized = true;
                        }
                        next[index] = value;
                    }
                }
                if resized {
                    self.record();
                }
                next.map(Value::array)
            }
            _ => {
                let mut built = Map::with_capacity(fields.len());
                for (key, patch) in fields {
                    if let Some(value) = self.build(None, patch) {
                        built.insert(key.clone(), value);
                    }
                }
                self.assign(target, Value::from(built))
            }
        }
    }

    fn apply_tag(&mut self, target: Option<&Value>, tag: &Tag) -> Option<Value> {
        match tag {
            Tag::Clear => {
                let current = target?;
                if current.is_empty_like() {
                    return None;
                }
                self.record();
                Some(current.empty_of())
            }
            Tag::Delete(keys) => self.delete(target?, keys),
            Tag::Move { from, to, count } => {
                let Value::Array(items) = target? else {
                    return None;
                };
                let moved = move_run(items, *from, *to, count.unwrap_or(1))?;
                self.record();
                Some(Value::array(moved))
            }
            Tag::Push(values) => {
                let Value::Array(items) = target? else {
                    return None;
                };
                if values.is_empty() {
                    return None;
                }
                let mut next = items.to_vec();
                next.extend(values.iter().cloned());
                self.record();
                Some(Value::array(next))
            }
            Tag::Replace(value) | Tag::Set(SetValue::Value(value)) => {
                self.assign(target, value.clone())
            }
            Tag::Set(SetValue::Compute(compute)) => {
                let value = compute(target.cloned().unwrap_or_default());
                self.assign(target, value)
            }
            Tag::Splice {
                start,
                delete_count,
                items,
            } => {
                let Value::Array(existing) = target? else {
                    return None;
                };
                let spliced = splice(existing, *start, *delete_count, items)?;
                self.record();
                Some(Value::array(spliced))
            }
        }
    }

    fn delete(&mut self, target: &Value, keys: &[String]) -> Option<Value> {
        if keys.is_empty() || target.is_empty_like() {
            return None;
        }
        match target {
            Value::Object(map) => {
                let mut next = None;
                for key in keys {
                    if !map.contains_key(key) {
                        continue;
                    }
                    next.get_or_insert_with(|| (**map).clone()).shift_remove(key);
                    self.record_child(key);
                }
                next.map(Value::from)
            }
            Value::Array(items) => {
                let mut indices: Vec<usize> = keys
                    .iter()
                    .filter_map(|key| resolve_index(key, items.len()))
                    .filter(|&index| index < items.len())
                    .collect();
                if indices.is_empty() {
                    return None;
                }
                indices.sort_unstable_by(|a, b| b.cmp(a));
                indices.dedup();
                let mut next = items.to_vec();
                for index in indices {
                    next.remove(index);
                }
                self.record();
                Some(Value::array(next))
            }
            _ => None,
        }
    }
}

/// Move `count` elements from `from` to `to`. `None` when nothing moves.
fn move_run(items: &[Value], from: i64, to: i64, count: usize) -> Option<Vec<Value>> {
    let len = items.len();
    let from = resolve_signed(from, len).filter(|&i| i < len)?;
    let to = resolve_signed(to, len).unwrap_or(0);
    let count = count.min(len - from);
    if count == 0 || from == to {
        return None;
    }

    let mut next = items.to_vec();
    let run: Vec<Value> = next.drain(from..from + count).collect();
    let at = to.min(next.len());
    next.splice(at..at, run);
    (next.as_slice() != items).then_some(next)
}

/// Array splice. Leading inserted items equal to the elements they would
/// replace are skipped. `None` when the array would not change.
fn splice(items: &[Value], start: i64, delete_count: usize, insert: &[Value]) -> Option<Vec<Value>> {
    let len = items.len();
    let mut start = resolve_signed(start, len).unwrap_or(0).min(len);
    let mut delete_count = delete_count.min(len - start);
    let mut insert = insert;

    while delete_count > 0 {
        match insert.split_first() {
            Some((head, rest)) if *head == items[start] => {
                start += 1;
                delete_count -= 1;
                insert = rest;
            }
            _ => break,
        }
    }
    if delete_count == 0 && insert.is_empty() {
        return None;
    }

    let mut next = items.to_vec();
    next.splice(start..start + delete_count, insert.iter().cloned());
    Some(next)
}

/// `patch` minus its top-level global key, or `None` if nothing is left.
fn without_global(patch: &Patch) -> Option<Patch> {
    let Patch::Map { tags, fields } = patch else {
        return None;
    };
    let mut fields = fields.clone();
    fields.shift_remove(GLOBAL_SELECTOR);
    if tags.is_empty() && fields.is_empty() {
        return None;
    }
    Some(Patch::Map {
        tags: tags.clone(),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(target: serde_json::Value, payload: serde_json::Value) -> (serde_json::Value, Vec<ChangedPath>) {
        let changes = Changes::parse(&payload).unwrap();
        let applied = apply(&Value::from(target), &changes);
        (applied.value.into(), applied.changed)
    }

    fn paths(raw: &[&[&str]]) -> Vec<ChangedPath> {
        raw.iter()
            .map(|path| path.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[test]
    fn merge_records_leaf_paths() {
        let (value, changed) = run(json!({"a": {"b": 1, "c": 2}}), json!({"a": {"b": 5}}));
        assert_eq!(value, json!({"a": {"b": 5, "c": 2}}));
        assert_eq!(changed, paths(&[&["a", "b"]]));
    }

    #[test]
    fn equal_assignment_is_a_no_op() {
        let target = Value::from(json!({"a": {"b": [1, 2]}, "c": 3}));
        let changes = Changes::parse(&json!({"a": {"b": [1, 2]}, "c": 3})).unwrap();

        let mut calls = 0;
        let applied = apply_with(&target, &changes, |_, _| calls += 1);
        assert!(!applied.is_changed());
        assert!(applied.value.ptr_eq(&target));
        assert_eq!(calls, 0);
    }

    #[test]
    fn unchanged_siblings_keep_identity() {
        let target = Value::from(json!({"a": {"b": 1}, "c": {"d": [1]}}));
        let changes = Changes::parse(&json!({"a": {"b": 2}})).unwrap();
        let applied = apply(&target, &changes);

        let before = target.get_path(&["c"]).unwrap();
        let after = applied.value.get_path(&["c"]).unwrap();
        assert!(before.ptr_eq(after));
    }

    #[test]
    fn new_subtrees_report_their_root() {
        let (value, changed) = run(json!({}), json!({"a": {"b": {"c": 1}}}));
        assert_eq!(value, json!({"a": {"b": {"c": 1}}}));
        assert_eq!(changed, paths(&[&["a"]]));
    }

    #[test]
    fn arrays_resize_to_incoming_length() {
        let (value, changed) = run(json!({"l": [1, 2, 3]}), json!({"l": [1, 5]}));
        assert_eq!(value, json!({"l": [1, 5]}));
        assert_eq!(changed, paths(&[&["l", "1"], &["l"]]));
    }

    #[test]
    fn indexed_map_updates_array_elements() {
        let (value, changed) = run(json!({"l": [1, 2, 3]}), json!({"l": {"-1": 9, "0": 7}}));
        assert_eq!(value, json!({"l": [7, 2, 9]}));
        assert_eq!(changed, paths(&[&["l", "2"], &["l", "0"]]));
    }

    #[test]
    fn indexed_map_past_the_end_leaves_gaps() {
        let (value, changed) = run(json!({"l": [1]}), json!({"l": {"3": 4}}));
        assert_eq!(value, json!({"l": [1, null, null, 4]}));
        assert_eq!(changed, paths(&[&["l", "3"], &["l"]]));
    }

    #[test]
    fn push_appends_and_reports_the_array() {
        let (value, changed) = run(json!({"tags": ["a", "b"]}), json!({"tags": {"@@PUSH": ["x"]}}));
        assert_eq!(value, json!({"tags": ["a", "b", "x"]}));
        assert_eq!(changed, paths(&[&["tags"]]));
    }

    #[test]
    fn push_ignores_non_arrays_and_empty_lists() {
        let (_, changed) = run(json!({"t": "s"}), json!({"t": {"@@PUSH": ["x"]}}));
        assert!(changed.is_empty());
        let (_, changed) = run(json!({"t": []}), json!({"t": {"@@PUSH": []}}));
        assert!(changed.is_empty());
    }

    #[test]
    fn move_relocates_a_run() {
        let (value, changed) = run(json!({"list": [1, 2, 3]}), json!({"list": {"@@MOVE": [0, 2]}}));
        assert_eq!(value, json!({"list": [2, 3, 1]}));
        assert_eq!(changed, paths(&[&["list"]]));

        let (value, _) = run(json!({"list": [1, 2, 3, 4]}), json!({"list": {"@@MOVE": [-1, 0]}}));
        assert_eq!(value, json!({"list": [4, 1, 2, 3]}));

        let (value, _) = run(json!({"list": [1, 2, 3, 4]}), json!({"list": {"@@MOVE": [2, 0, 9]}}));
        assert_eq!(value, json!({"list": [3, 4, 1, 2]}));
    }

    #[test]
    fn move_onto_itself_is_a_no_op() {
        let (_, changed) = run(json!({"list": [1, 2]}), json!({"list": {"@@MOVE": [1, 1]}}));
        assert!(changed.is_empty());
        let (_, changed) = run(json!({"list": []}), json!({"list": {"@@MOVE": [0, 1]}}));
        assert!(changed.is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let (value, changed) = run(json!({"a": [1], "b": "x"}), json!({"a": "@@CLEAR", "b": "@@CLEAR"}));
        assert_eq!(value, json!({"a": [], "b": ""}));
        assert_eq!(changed, paths(&[&["a"], &["b"]]));

        let (_, changed) = run(json!({"a": [], "b": {}}), json!({"a": "@@CLEAR", "b": {"@@CLEAR": true}}));
        assert!(changed.is_empty());
    }

    #[test]
    fn delete_object_keys_reports_each_key() {
        let (value, changed) = run(
            json!({"m": {"a": 1, "b": 2, "c": 3}}),
            json!({"m": {"@@DELETE": ["a", "c", "zz"]}}),
        );
        assert_eq!(value, json!({"m": {"b": 2}}));
        assert_eq!(changed, paths(&[&["m", "a"], &["m", "c"]]));
    }

    #[test]
    fn delete_array_indices() {
        let (value, changed) = run(json!({"l": [0, 1, 2, 3]}), json!({"l": {"@@DELETE": [0, -1, 0]}}));
        assert_eq!(value, json!({"l": [1, 2]}));
        assert_eq!(changed, paths(&[&["l"]]));

        let (_, changed) = run(json!({"l": [0]}), json!({"l": {"@@DELETE": []}}));
        assert!(changed.is_empty());
    }

    #[test]
    fn replace_swaps_the_whole_slice() {
        let (value, changed) = run(json!({"a": {"x": 1, "y": 2}}), json!({"a": {"@@REPLACE": {"z": 3}}}));
        assert_eq!(value, json!({"a": {"z": 3}}));
        assert_eq!(changed, paths(&[&["a"]]));
    }

    #[test]
    fn replace_keeps_identity_of_equal_subtrees() {
        let target = Value::from(json!({"a": {"keep": {"n": 1}, "drop": 2}}));
        let changes = Changes::parse(&json!({"a": {"@@REPLACE": {"keep": {"n": 1}}}})).unwrap();
        let applied = apply(&target, &changes);

        let before = target.get_path(&["a", "keep"]).unwrap();
        let after = applied.value.get_path(&["a", "keep"]).unwrap();
        assert!(before.ptr_eq(after));
    }

    #[test]
    fn computed_set_receives_the_current_value() {
        let target = Value::from(json!({"n": 41}));
        let patch = Patch::fields([(
            "n",
            Patch::tag(Tag::set_with(|current| {
                Value::from(current.as_i64().unwrap_or(0) + 1)
            })),
        )]);
        let applied = apply(&target, &Changes::from(patch));
        assert_eq!(serde_json::Value::from(applied.value), json!({"n": 42}));
    }

    #[test]
    fn splice_skips_matching_leading_items() {
        let (value, changed) = run(json!({"l": [1, 2, 3]}), json!({"l": {"@@SPLICE": [0, 2, 1, 9]}}));
        assert_eq!(value, json!({"l": [1, 9, 3]}));
        assert_eq!(changed, paths(&[&["l"]]));

        let (_, changed) = run(json!({"l": [1, 2, 3]}), json!({"l": {"@@SPLICE": [0, 2, 1, 2]}}));
        assert!(changed.is_empty());

        let (value, _) = run(json!({"l": [1, 2]}), json!({"l": {"@@SPLICE": [-1, 0, "x"]}}));
        assert_eq!(value, json!({"l": [1, "x", 2]}));
    }

    #[test]
    fn root_level_tags_report_the_empty_path() {
        let (value, changed) = run(json!({"a": 1}), json!({"@@REPLACE": {"b": 2}}));
        assert_eq!(value, json!({"b": 2}));
        assert_eq!(changed, vec![Vec::<String>::new()]);
    }

    #[test]
    fn global_key_addresses_the_root() {
        let (value, changed) = run(
            json!({"a": 1, "b": 2}),
            json!({"@@GLOBAL": {"@@DELETE": ["a"]}, "b": 3}),
        );
        assert_eq!(value, json!({"b": 3}));
        assert_eq!(changed, paths(&[&["a"], &["b"]]));
    }

    #[test]
    fn payload_lists_apply_in_order() {
        let (value, changed) = run(json!({"n": 1}), json!([{"n": 2}, {"n": 3}, {"m": 1}]));
        assert_eq!(value, json!({"n": 3, "m": 1}));
        assert_eq!(changed, paths(&[&["n"], &["m"]]));
    }
}
