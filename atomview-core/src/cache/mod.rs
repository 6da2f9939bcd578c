//! Accessor Cache
//!
//! Clients read the value through accessors: shared subscriptions to a set
//! of paths. Clients asking for the same set share one accessor, and an
//! accessor recomputes only the paths whose atom changed since it last
//! answered.
//!
//! # Eviction
//!
//! Accessors are reference counted by client and aged by an [`AgingTable`].
//! The cache owner drives the sweep through [`AccessorCache::prune`] or
//! [`AccessorCache::tick`]; nothing runs in the background.

mod accessor;
mod accessor_cache;
mod aging;

pub use accessor::Accessor;
pub use accessor_cache::{AccessorCache, Response};
pub use aging::AgingTable;
