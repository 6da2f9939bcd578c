//! Immutable Values
//!
//! `Value` is the persistent, reference-counted value graph every other part
//! of the crate shares. Composites live behind `Arc`, so cloning a value is a
//! pointer copy and two snapshots of the same subtree can be compared by
//! identity instead of by content.
//!
//! # Identity
//!
//! Consumers skip recomputation by comparing snapshots with [`Value::same`]:
//! composites compare by pointer, scalars compare by value. Every update path
//! in the crate therefore goes out of its way to hand back the *old* `Arc`
//! for any subtree that did not change (see [`reconcile`]).
//!
//! # Paths
//!
//! Path tokens address object keys or array indices. Array tokens may be
//! negative, counting back from the end. A leading global selector token
//! addresses the whole value.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::path::GLOBAL_SELECTOR;

/// Ordered object storage.
pub type Map = IndexMap<String, Value>;

/// An immutable node of the value graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// Any JSON number.
    Number(serde_json::Number),
    /// A shared string.
    String(Arc<str>),
    /// A shared array.
    Array(Arc<Vec<Value>>),
    /// A shared, insertion-ordered object.
    Object(Arc<Map>),
}

impl Value {
    /// Build an array value.
    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Array(Arc::new(items.into_iter().collect()))
    }

    /// Build an object value.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for arrays and objects.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Name of the value's type, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Reference identity of composites.
    ///
    /// Scalars have no identity and never compare `ptr_eq`.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Snapshot equivalence: identity for composites, equality for scalars.
    pub fn same(&self, other: &Value) -> bool {
        if self.is_composite() || other.is_composite() {
            self.ptr_eq(other)
        } else {
            self == other
        }
    }

    /// True when the value is already its type's empty value.
    pub fn is_empty_like(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    /// The empty value of this value's type. Scalars without an empty form
    /// reset to `Null`.
    pub fn empty_of(&self) -> Value {
        match self {
            Value::String(_) => Value::String(Arc::from("")),
            Value::Array(_) => Value::Array(Arc::default()),
            Value::Object(_) => Value::Object(Arc::default()),
            _ => Value::Null,
        }
    }

    /// Look up a single token.
    pub fn get_token(&self, token: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(token),
            Value::Array(items) => resolve_index(token, items.len()).and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Look up a token path.
    pub fn get_path<S: AsRef<str>>(&self, tokens: &[S]) -> Option<&Value> {
        strip_global(tokens)
            .iter()
            .try_fold(self, |current, token| current.get_token(token.as_ref()))
    }
}

fn strip_global<S: AsRef<str>>(tokens: &[S]) -> &[S] {
    match tokens.split_first() {
        Some((head, rest)) if head.as_ref() == GLOBAL_SELECTOR => rest,
        _ => tokens,
    }
}

/// Resolve an array token against a length.
///
/// Non-negative tokens resolve to themselves, even past the end. Negative
/// tokens count back from `len` and fail when they reach before the start.
pub fn resolve_index(token: &str, len: usize) -> Option<usize> {
    let index: i64 = token.parse().ok()?;
    resolve_signed(index, len)
}

/// Signed counterpart of [`resolve_index`].
pub fn resolve_signed(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        usize::try_from(index).ok()
    } else {
        let back = usize::try_from(index.unsigned_abs()).ok()?;
        len.checked_sub(back)
    }
}

/// True for tokens that look like (possibly negative) array indices.
pub fn is_index_token(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Copy-on-write update of the value at `tokens`.
///
/// Only the spine from `base` down to the target is cloned; every sibling
/// keeps its identity. `None` removes the target.
pub fn with_path<S: AsRef<str>>(
    base: Option<&Value>,
    tokens: &[S],
    value: Option<Value>,
) -> Option<Value> {
    let tokens = strip_global(tokens);
    let Some((head, rest)) = tokens.split_first() else {
        return value;
    };
    let head = head.as_ref();

    match base {
        Some(Value::Object(map)) => {
            let child = with_path(map.get(head), rest, value);
            if child.is_none() && !map.contains_key(head) {
                return base.cloned();
            }
            let mut next = (**map).clone();
            match child {
                Some(v) => {
                    next.insert(head.to_owned(), v);
                }
                None => {
                    next.shift_remove(head);
                }
            }
            Some(Value::Object(Arc::new(next)))
        }
        Some(Value::Array(items)) => {
            let Some(index) = resolve_index(head, items.len()) else {
                return base.cloned();
            };
            let child = with_path(items.get(index), rest, value);
            let Some(child) = child else {
                return base.cloned();
            };
            let mut next = items.to_vec();
            if index >= next.len() {
                next.resize(index + 1, Value::Null);
            }
            next[index] = child;
            Some(Value::Array(Arc::new(next)))
        }
        _ => match with_path(None, rest, value) {
            Some(child) => Some(Value::object([(head, child)])),
            None => base.cloned(),
        },
    }
}

/// Reconcile `next` against `prev`.
///
/// Walks both values once. Every subtree of `next` that is deep-equal to its
/// counterpart in `prev` is replaced by `prev`'s reference, so unchanged
/// branches keep their identity. Returns the reconciled value and whether
/// anything differed.
pub fn reconcile(prev: &Value, next: Value) -> (Value, bool) {
    if prev.ptr_eq(&next) {
        return (prev.clone(), false);
    }

    match (prev, &next) {
        (Value::Object(before), Value::Object(after)) => {
            let mut changed = before.len() != after.len();
            let mut merged = Map::with_capacity(after.len());
            for (key, value) in after.iter() {
                let entry = match before.get(key) {
                    Some(old) => {
                        let (v, c) = reconcile(old, value.clone());
                        changed |= c;
                        v
                    }
                    None => {
                        changed = true;
                        value.clone()
                    }
                };
                merged.insert(key.clone(), entry);
            }
            if changed {
                (Value::Object(Arc::new(merged)), true)
            } else {
                (prev.clone(), false)
            }
        }
        (Value::Array(before), Value::Array(after)) => {
            let mut changed = before.len() != after.len();
            let mut merged = Vec::with_capacity(after.len());
            for (i, value) in after.iter().enumerate() {
                match before.get(i) {
                    Some(old) => {
                        let (v, c) = reconcile(old, value.clone());
                        changed |= c;
                        merged.push(v);
                    }
                    None => merged.push(value.clone()),
                }
            }
            if changed {
                (Value::Array(Arc::new(merged)), true)
            } else {
                (prev.clone(), false)
            }
        }
        _ if *prev == next => (prev.clone(), false),
        _ => (next, true),
    }
}

/// [`reconcile`] over possibly absent values.
pub fn reconcile_opt(prev: Option<&Value>, next: Option<Value>) -> (Option<Value>, bool) {
    match (prev, next) {
        (None, None) => (None, false),
        (Some(prev), Some(next)) => {
            let (value, changed) = reconcile(prev, next);
            (Some(value), changed)
        }
        (_, next) => (next, true),
    }
}

/// [`Value::same`] over possibly absent values.
pub fn same_opt(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same(b),
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self))
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(Arc::from(s)),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        serde_json::Value::from(&value)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(Arc::new(map))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
