//! Error types.
//!
//! Only contract violations are errors: malformed tag arguments in a patch
//! payload, and tree operations addressed to an inactive node. No-op
//! conditions (equal values, missing keys, empty ranges) are absorbed
//! silently and never surface here.

use thiserror::Error;

use crate::ids::PathId;

/// Result alias for fallible crate operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Malformed tag command in a patch payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// The tag needs a list argument.
    #[error("{tag} expects a list argument, found {found}")]
    ExpectedList {
        tag: &'static str,
        found: &'static str,
    },

    /// The tag needs leading integer arguments.
    #[error("{tag} expects at least {expected} integer arguments")]
    ExpectedIntegers { tag: &'static str, expected: usize },

    /// A count argument was negative.
    #[error("{tag} expects a non-negative count, found {found}")]
    NegativeCount { tag: &'static str, found: i64 },

    /// A key to delete is neither a string nor an integer.
    #[error("{tag} cannot address a key of type {found}")]
    InvalidKey {
        tag: &'static str,
        found: &'static str,
    },
}

/// Precondition violation on the atom tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The operation requires an active node.
    #[error("no active atom for path id {path}")]
    InactiveNode { path: PathId },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A textual payload was not valid JSON.
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_tag() {
        let err = PatchError::ExpectedList {
            tag: "@@PUSH",
            found: "number",
        };
        assert_eq!(err.to_string(), "@@PUSH expects a list argument, found number");

        let err: Error = PatchError::ExpectedIntegers {
            tag: "@@MOVE",
            expected: 2,
        }
        .into();
        assert_eq!(err.to_string(), "@@MOVE expects at least 2 integer arguments");
    }
}
