//! Atomview Core
//!
//! This crate provides a fine-grained observation cache over a single
//! immutable value graph. It implements:
//!
//! - Persistent values with structural sharing and identity-preserving updates
//! - A path-indexed atom tree with root/descendant promotion
//! - Shared path-set accessors with lazy, partial recomputation
//! - A patch engine with deep merge and structural tag commands
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: The immutable value type and path helpers
//! - `path`: Path tokenizing and the interning repository
//! - `tree`: Atoms and the atom node tree
//! - `cache`: Accessors, the accessor cache and TTL aging
//! - `patch`: Patch payloads, tag commands and the engine
//! - `store`: The public store and its thread-safe wrapper
//!
//! # Example
//!
//! ```rust
//! use atomview_core::{ClientId, Changes, Store, Value};
//! use serde_json::json;
//!
//! let mut store = Store::new(json!({"a": {"b": 1, "c": 2}}));
//! let client = ClientId::new();
//!
//! let before = store.get(client, &["a.b", "a.c"]);
//! assert_eq!(before["a.b"], Value::from(1));
//!
//! let changes = Changes::parse(&json!({"a": {"b": 5}})).unwrap();
//! let changed = store.set(changes);
//! assert_eq!(changed, vec![vec!["a".to_string(), "b".to_string()]]);
//!
//! let after = store.get(client, &["a.b", "a.c"]);
//! assert_eq!(after["a.b"], Value::from(5));
//! assert!(after["a.c"].same(&before["a.c"]));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod ids;
pub mod patch;
pub mod path;
pub mod store;
pub mod tree;
pub mod value;

pub use cache::{Accessor, AccessorCache, AgingTable, Response};
pub use config::CacheConfig;
pub use error::{Error, PatchError, Result, TreeError};
pub use ids::{AccessorId, ClientId, PathId};
pub use patch::{apply, apply_with, Applied, ChangedPath, Changes, Patch, SetValue, Tag};
pub use path::{PathIds, PathRepository, GLOBAL_SELECTOR};
pub use store::{SharedStore, Store};
pub use tree::{Atom, AtomLookup, AtomNodeTree};
pub use value::Value;
