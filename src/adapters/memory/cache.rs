//! In-memory reference implementation of the result cache.
//!
//! Entries carry TTL, tags, size, and hit counters; a tag index supports
//! bulk invalidation. All mutation happens under a single write lock, so
//! tag invalidation is atomic across the whole tag set. TTL expiry is lazy:
//! expired entries are dropped when touched.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::domain::error::OrchestratorResult;
use crate::domain::models::CacheConfig;
use crate::domain::ports::{normalize_key, CacheStats, CacheWriteOptions, ResultCache};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    hits: u64,
    last_access: DateTime<Utc>,
    size_bytes: usize,
    tags: BTreeSet<String>,
    /// Whether the caller asked for compression and the value crossed the
    /// configured threshold. Values stay opaque here.
    compressed: bool,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    tag_index: HashMap<String, BTreeSet<String>>,
    hits: u64,
    misses: u64,
    expired: u64,
}

impl CacheInner {
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        Some(entry)
    }
}

/// In-memory cache.
pub struct InMemoryCache {
    config: CacheConfig,
    inner: RwLock<CacheInner>,
}

impl InMemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn key(&self, raw: &str) -> String {
        normalize_key(&self.config.key_prefix, raw)
    }
}

#[async_trait]
impl ResultCache for InMemoryCache {
    async fn get(&self, key: &str) -> OrchestratorResult<Option<String>> {
        let key = self.key(key);
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let expired = matches!(
            inner.entries.get(&key),
            Some(entry) if entry.expires_at.is_some_and(|at| at <= now)
        );
        if expired {
            inner.remove_entry(&key);
            inner.expired += 1;
            inner.misses += 1;
            return Ok(None);
        }

        match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.hits += 1;
                entry.last_access = now;
                let value = entry.value.clone();
                inner.hits += 1;
                Ok(Some(value))
            }
            None => {
                inner.misses += 1;
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        options: CacheWriteOptions,
    ) -> OrchestratorResult<()> {
        let key = self.key(key);
        let now = Utc::now();
        let size_bytes = value.len();
        let compressed = options.compress
            && self.config.enable_compression
            && size_bytes >= self.config.compression_threshold_bytes;
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: options
                .ttl_ms
                .map(|ttl| now + Duration::milliseconds(ttl as i64)),
            hits: 0,
            last_access: now,
            size_bytes,
            tags: options.tags.iter().cloned().collect(),
            compressed,
        };

        let mut inner = self.inner.write().await;
        // Replacing an entry re-homes its tags.
        inner.remove_entry(&key);
        for tag in &entry.tags {
            inner
                .tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        tracing::trace!(key = %key, size_bytes, compressed = entry.compressed, "cache set");
        inner.entries.insert(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> OrchestratorResult<bool> {
        let key = self.key(key);
        let mut inner = self.inner.write().await;
        Ok(inner.remove_entry(&key).is_some())
    }

    async fn clear(&self) -> OrchestratorResult<()> {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.tag_index.clear();
        Ok(())
    }

    async fn invalidate_by_tags(&self, tags: &[String]) -> OrchestratorResult<u64> {
        let mut inner = self.inner.write().await;
        let mut doomed: BTreeSet<String> = BTreeSet::new();
        for tag in tags {
            if let Some(keys) = inner.tag_index.get(tag) {
                doomed.extend(keys.iter().cloned());
            }
        }
        let mut removed = 0;
        for key in doomed {
            if inner.remove_entry(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            entries: inner.entries.len(),
            total_size_bytes: inner.entries.values().map(|e| e.size_bytes).sum(),
            hits: inner.hits,
            misses: inner.misses,
            expired: inner.expired,
            tag_count: inner.tag_index.len(),
        }
    }
}
