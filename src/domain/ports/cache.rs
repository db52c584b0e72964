//! Result cache port.
//!
//! Keys are normalised (lowercase, anything outside `[a-z0-9:_-]` becomes
//! `_`) before hitting the backend, so every implementation shares one key
//! space. Tag invalidation must be atomic across the whole tag set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::OrchestratorResult;

/// Options for a cache write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheWriteOptions {
    /// Entry TTL; `None` means no expiry.
    pub ttl_ms: Option<u64>,
    /// Tags for bulk invalidation.
    pub tags: Vec<String>,
    /// Ask the backend to compress the value. Values stay opaque to the
    /// core; the entry only records whether compression was requested.
    pub compress: bool,
}

impl CacheWriteOptions {
    pub fn with_ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub tag_count: usize,
}

/// Shared cache of opaque task outputs.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> OrchestratorResult<Option<String>>;

    async fn set(
        &self,
        key: &str,
        value: String,
        options: CacheWriteOptions,
    ) -> OrchestratorResult<()>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> OrchestratorResult<bool>;

    async fn clear(&self) -> OrchestratorResult<()>;

    /// Remove every entry carrying any of the given tags. Atomic across the
    /// tag set; returns the number of entries removed.
    async fn invalidate_by_tags(&self, tags: &[String]) -> OrchestratorResult<u64>;

    async fn stats(&self) -> CacheStats;
}

/// Normalise a raw key into the shared key space.
pub fn normalize_key(prefix: &str, raw: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + raw.len() + 1);
    if !prefix.is_empty() {
        key.push_str(prefix);
        key.push(':');
    }
    for c in raw.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, ':' | '_' | '-') {
            key.push(c);
        } else {
            key.push('_');
        }
    }
    key
}
