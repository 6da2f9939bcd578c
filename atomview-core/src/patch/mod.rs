//! Patch/Tag Engine
//!
//! Partial updates of the value graph. A payload mirrors the shape of the
//! value: plain data deep-merges, and reserved `@@` keys select a structural
//! command instead.
//!
//! # Wire Format
//!
//! ```text
//! {"user": {"name": "x"}}              merge a field
//! {"tags": {"@@PUSH": ["a"]}}          append to an array
//! {"list": {"@@MOVE": [0, 2]}}         move list[0] to index 2
//! {"list": "@@CLEAR"}                  reset to the empty value
//! {"@@GLOBAL": {"@@REPLACE": {}}}      address the whole root
//! [{"a": 1}, {"b": 2}]                 payloads applied in order
//! ```
//!
//! Malformed tag arguments are rejected by [`Patch::parse`]; everything that
//! parses applies without error.

mod engine;
mod payload;
mod tag;

pub use engine::{apply, apply_with, Applied, ChangedPath};
pub use payload::{Changes, Patch};
pub use tag::{
    ComputeFn, SetValue, Tag, CLEAR_TAG, DELETE_TAG, EMPTY_SELECTOR, MOVE_TAG, PUSH_TAG,
    REPLACE_TAG, SET_TAG, SPLICE_TAG,
};
