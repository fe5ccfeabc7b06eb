//! TTL response cache
//!
//! Entries are immutable once stored and expire lazily: a lookup past the
//! TTL drops the entry and reports a miss. With a cache directory configured
//! every entry is also written as `<key>.json`, via a temp file and rename so
//! a concurrent reader never sees a half-written entry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use url::Url;

use super::QueryParams;
use crate::error::HttpError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: serde_json::Value,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        // Entries stamped in the future (clock skew) count as brand new.
        let age = now
            .signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age < ttl
    }
}

/// Canonical form of a URL: lowercase scheme/host, no fragment, and any
/// inline query pairs sorted.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            url.set_query(None);
            if !pairs.is_empty() {
                pairs.sort();
                url.query_pairs_mut().extend_pairs(pairs);
            }
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

/// Stable hash of (normalized URL, parameters). Identical across processes,
/// so persisted entries survive restarts.
pub fn cache_key(url: &str, params: &QueryParams) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(normalize_url(url).as_bytes());
    for (name, value) in params {
        hasher.update(b"\n");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

pub struct ResponseCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
    dir: Option<PathBuf>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl ResponseCache {
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            dir: None,
            inflight: DashMap::new(),
        }
    }

    /// Cache backed by a directory of entry files. The directory is created
    /// if missing.
    pub async fn persistent(ttl: Duration, dir: impl Into<PathBuf>) -> Result<Self, HttpError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            HttpError::Cache(format!(
                "failed to create cache directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self {
            dir: Some(dir),
            ..Self::in_memory(ttl)
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Number of entries currently held in memory (fresh or not yet evicted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh payload for `key`, if any. Stale entries are evicted here.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Utc::now();

        let cached = self.entries.get(key).map(|e| e.value().clone());
        if let Some(entry) = cached {
            if entry.is_fresh(self.ttl, now) {
                return Some(entry.payload);
            }
            tracing::debug!(key, "Cache entry expired");
            self.entries.remove(key);
            self.remove_file(key).await;
            return None;
        }

        let path = self.entry_path(key)?;
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding unreadable cache entry");
                self.remove_file(key).await;
                return None;
            }
        };

        if entry.is_fresh(self.ttl, now) {
            let payload = entry.payload.clone();
            self.entries.insert(key.to_string(), entry);
            Some(payload)
        } else {
            tracing::debug!(key, "Persisted cache entry expired");
            self.remove_file(key).await;
            None
        }
    }

    pub async fn put(&self, key: &str, payload: serde_json::Value) -> Result<(), HttpError> {
        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            stored_at: Utc::now(),
        };

        if let Some(path) = self.entry_path(key) {
            let body = serde_json::to_vec(&entry)
                .map_err(|e| HttpError::Cache(format!("failed to encode entry: {}", e)))?;
            let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
            tokio::fs::write(&tmp, &body)
                .await
                .map_err(|e| HttpError::Cache(format!("failed to write {}: {}", tmp.display(), e)))?;
            if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(HttpError::Cache(format!(
                    "failed to finalize {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    /// Drop every entry, in memory and on disk.
    pub async fn clear(&self) -> Result<(), HttpError> {
        self.entries.clear();

        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let mut listing = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| HttpError::Cache(format!("failed to list {}: {}", dir.display(), e)))?;
        while let Ok(Some(item)) = listing.next_entry().await {
            let path = item.path();
            let is_entry = path
                .extension()
                .map(|ext| ext == "json" || ext == "tmp")
                .unwrap_or(false);
            if is_entry {
                let _ = tokio::fs::remove_file(&path).await;
            }
        }
        tracing::info!(dir = %dir.display(), "HTTP cache cleared");
        Ok(())
    }

    /// Serialize fetches of the same key so concurrent misses make one
    /// network call. Pair with `release_key` once the guard is dropped.
    pub(crate) async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self.inflight.entry(key.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    pub(crate) fn release_key(&self, key: &str) {
        self.inflight
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.json", key)))
    }

    async fn remove_file(&self, key: &str) {
        if let Some(path) = self.entry_path(key) {
            let _ = tokio::fs::remove_file(path).await;
        }
    }
}
