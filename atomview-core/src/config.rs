//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables of an [`AccessorCache`](crate::cache::AccessorCache).
///
/// Deserializable so hosts can load it from their own configuration; any
/// missing field falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long an accessor may go untouched before a sweep evicts it.
    pub accessor_ttl: Duration,

    /// Path count above which a partial refresh scans the changed set
    /// filtered by membership instead of walking it directly.
    pub refresh_scan_threshold: usize,
}

impl CacheConfig {
    pub const DEFAULT_ACCESSOR_TTL: Duration = Duration::from_secs(10 * 60);
    pub const DEFAULT_REFRESH_SCAN_THRESHOLD: usize = 64;

    pub fn with_accessor_ttl(mut self, ttl: Duration) -> Self {
        self.accessor_ttl = ttl;
        self
    }

    pub fn with_refresh_scan_threshold(mut self, threshold: usize) -> Self {
        self.refresh_scan_threshold = threshold;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            accessor_ttl: Self::DEFAULT_ACCESSOR_TTL,
            refresh_scan_threshold: Self::DEFAULT_REFRESH_SCAN_THRESHOLD,
        }
    }
}
