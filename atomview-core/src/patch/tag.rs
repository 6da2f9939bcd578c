//! Tag commands.
//!
//! A tag is a reserved key inside a patch map that replaces the default merge
//! with one structural command. Arguments are checked when the payload is
//! parsed, so applying a tag never fails.

use std::fmt;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::error::PatchError;
use crate::value::Value;

pub const CLEAR_TAG: &str = "@@CLEAR";
pub const DELETE_TAG: &str = "@@DELETE";
pub const MOVE_TAG: &str = "@@MOVE";
pub const PUSH_TAG: &str = "@@PUSH";
pub const REPLACE_TAG: &str = "@@REPLACE";
pub const SET_TAG: &str = "@@SET";
pub const SPLICE_TAG: &str = "@@SPLICE";

/// Synthetic key the engine nests the root under.
pub const EMPTY_SELECTOR: &str = "@@EMPTY";

/// Replacement computed from the current value.
pub type ComputeFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Argument of [`Tag::Set`].
#[derive(Clone)]
pub enum SetValue {
    Value(Value),
    /// Receives the current value (`Null` when absent) and returns the
    /// replacement.
    Compute(ComputeFn),
}

impl SetValue {
    pub fn compute<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        SetValue::Compute(Arc::new(f))
    }
}

impl fmt::Debug for SetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            SetValue::Compute(_) => f.write_str("Compute(..)"),
        }
    }
}

/// A structural command.
#[derive(Debug, Clone)]
pub enum Tag {
    /// Reset to the type's empty value.
    Clear,
    /// Remove object keys or array indices.
    Delete(Vec<String>),
    /// Relocate `count` elements (default 1) starting at `from` to `to`.
    Move {
        from: i64,
        to: i64,
        count: Option<usize>,
    },
    /// Append to an array.
    Push(Vec<Value>),
    /// Replace the whole slice.
    Replace(Value),
    /// Replace the whole slice, possibly computed from the current value.
    Set(SetValue),
    /// Remove `delete_count` elements at `start`, then insert `items` there.
    Splice {
        start: i64,
        delete_count: usize,
        items: Vec<Value>,
    },
}

impl Tag {
    /// Wire name of the tag.
    pub fn name(&self) -> &'static str {
        match self {
            Tag::Clear => CLEAR_TAG,
            Tag::Delete(_) => DELETE_TAG,
            Tag::Move { .. } => MOVE_TAG,
            Tag::Push(_) => PUSH_TAG,
            Tag::Replace(_) => REPLACE_TAG,
            Tag::Set(_) => SET_TAG,
            Tag::Splice { .. } => SPLICE_TAG,
        }
    }

    /// Shorthand for a computed `@@SET`.
    pub fn set_with<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Tag::Set(SetValue::compute(f))
    }

    /// Parse a tag from its wire key and argument.
    ///
    /// Returns `Ok(None)` when `name` is not a tag key.
    pub fn from_wire(name: &str, arg: &Json) -> Result<Option<Tag>, PatchError> {
        let tag = match name {
            CLEAR_TAG => Tag::Clear,
            DELETE_TAG => {
                let keys = expect_list(DELETE_TAG, arg)?
                    .iter()
                    .map(|key| match key {
                        Json::String(s) => Ok(s.clone()),
                        Json::Number(n) if n.is_i64() => Ok(n.to_string()),
                        other => Err(PatchError::InvalidKey {
                            tag: DELETE_TAG,
                            found: json_kind(other),
                        }),
                    })
                    .collect::<Result<_, _>>()?;
                Tag::Delete(keys)
            }
            MOVE_TAG => {
                let args = expect_list(MOVE_TAG, arg)?;
                let (from, to) = leading_integers(MOVE_TAG, args)?;
                let count = match args.get(2).and_then(Json::as_i64) {
                    Some(n) => Some(non_negative(MOVE_TAG, n)?),
                    None => None,
                };
                Tag::Move { from, to, count }
            }
            PUSH_TAG => Tag::Push(
                expect_list(PUSH_TAG, arg)?
                    .iter()
                    .cloned()
                    .map(Value::from)
                    .collect(),
            ),
            REPLACE_TAG => Tag::Replace(Value::from(arg.clone())),
            SET_TAG => Tag::Set(SetValue::Value(Value::from(arg.clone()))),
            SPLICE_TAG => {
                let args = expect_list(SPLICE_TAG, arg)?;
                let (start, delete_count) = leading_integers(SPLICE_TAG, args)?;
                Tag::Splice {
                    start,
                    delete_count: non_negative(SPLICE_TAG, delete_count)?,
                    items: args[2..].iter().cloned().map(Value::from).collect(),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(tag))
    }
}

fn expect_list<'a>(tag: &'static str, arg: &'a Json) -> Result<&'a Vec<Json>, PatchError> {
    arg.as_array().ok_or(PatchError::ExpectedList {
        tag,
        found: json_kind(arg),
    })
}

fn leading_integers(tag: &'static str, args: &[Json]) -> Result<(i64, i64), PatchError> {
    match (
        args.first().and_then(Json::as_i64),
        args.get(1).and_then(Json::as_i64),
    ) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(PatchError::ExpectedIntegers { tag, expected: 2 }),
    }
}

fn non_negative(tag: &'static str, n: i64) -> Result<usize, PatchError> {
    usize::try_from(n).map_err(|_| PatchError::NegativeCount { tag, found: n })
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
