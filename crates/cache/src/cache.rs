//! The persistent result cache.

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::errors::{CacheError, Result};
use crate::stats::CacheStats;
use crate::store::{CacheStore, SweepReport};
use crate::writer::SnapshotWriter;
use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tokio::sync::oneshot;

/// Key → value store with TTL expiry and a size cap, persisted as one JSON
/// snapshot file
///
/// Every mutation is applied in memory under a lock, then the whole store is
/// handed to a writer thread. Lookups never touch the disk. Storage failures
/// are logged and otherwise ignored, so a broken cache degrades to a cache
/// that always misses.
pub struct ResultCache {
    config: CacheConfig,
    store: Mutex<CacheStore>,
    writer: SnapshotWriter,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("config", &self.config)
            .field("entries", &self.store.lock().len())
            .finish()
    }
}

impl ResultCache {
    /// Open the cache, loading its snapshot if one exists
    ///
    /// A missing or unreadable snapshot yields an empty cache. Only invalid
    /// configuration or failing to start the writer thread is an error.
    pub fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(
                    path = %parent.display(),
                    error = %e,
                    "could not create cache directory"
                );
            }
        }

        let store = match CacheStore::load(&config.path) {
            Ok(store) => {
                tracing::debug!(
                    path = %config.path.display(),
                    entries = store.len(),
                    "loaded cache snapshot"
                );
                store
            }
            Err(e) if e.is_not_found() => CacheStore::new(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load cache, starting empty");
                CacheStore::new()
            }
        };

        let writer = SnapshotWriter::spawn(config.path.clone())?;

        Ok(Self {
            config,
            store: Mutex::new(store),
            writer,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Live value for `key`, sweeping expired entries first
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut store = self.store.lock();
        self.sweep_locked(&mut store);
        let value = store.get(key).map(|entry| entry.value.clone());
        tracing::trace!(key, hit = value.is_some(), "cache lookup");
        value
    }

    /// Live value for `key` decoded as `T`; undecodable values count as absent
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(key, error = %e, "cached value has an unexpected shape");
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Live keys, oldest first
    pub fn keys(&self) -> Vec<String> {
        let mut store = self.store.lock();
        self.sweep_locked(&mut store);
        store.keys().map(str::to_owned).collect()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let mut store = self.store.lock();
        self.sweep_locked(&mut store);
        store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `value` under `key`, run the eviction sweep, and persist
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "value is not cacheable");
                return;
            }
        };

        let pending = {
            let mut store = self.store.lock();
            store.insert(key, CacheEntry::new(value, Utc::now()));
            self.sweep_locked(&mut store);
            self.enqueue(&store)
        };
        self.settle(pending).await;
    }

    /// Remove `key`, returning whether it was present
    pub async fn delete(&self, key: &str) -> bool {
        let pending = {
            let mut store = self.store.lock();
            if store.remove(key).is_none() {
                return false;
            }
            self.enqueue(&store)
        };
        self.settle(pending).await;
        true
    }

    /// Drop every entry
    pub async fn clear(&self) {
        let pending = {
            let mut store = self.store.lock();
            store.clear();
            self.enqueue(&store)
        };
        self.settle(pending).await;
    }

    /// Run the eviction sweep now, persisting if anything was removed
    pub async fn sweep(&self) -> SweepReport {
        let (report, pending) = {
            let mut store = self.store.lock();
            let report = self.sweep_locked(&mut store);
            let pending = (report.removed() > 0).then(|| self.enqueue(&store));
            (report, pending)
        };
        if let Some(pending) = pending {
            self.settle(pending).await;
        }
        report
    }

    /// Persist the current contents, reporting any storage failure
    pub async fn flush(&self) -> Result<()> {
        let pending = {
            let store = self.store.lock();
            let snapshot = store.to_snapshot()?;
            self.writer.submit(snapshot)
        };
        wait_for(pending, self.path()).await
    }

    /// Counts as of now; does not sweep or persist
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let (total, valid) = {
            let store = self.store.lock();
            (store.len(), store.count_valid(now, self.config.ttl))
        };
        let file_size_bytes = std::fs::metadata(&self.config.path)
            .map(|meta| meta.len())
            .unwrap_or(0);

        CacheStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
            max_size: self.config.max_size,
            ttl_seconds: self.config.ttl.as_secs(),
            usage_percent: total as f64 / self.config.max_size as f64 * 100.0,
            path: self.config.path.clone(),
            file_size_bytes,
        }
    }

    fn sweep_locked(&self, store: &mut CacheStore) -> SweepReport {
        let report = store.sweep(Utc::now(), self.config.ttl, self.config.max_size);
        if report.evicted > 0 {
            tracing::debug!(
                expired = report.expired,
                evicted = report.evicted,
                remaining = store.len(),
                "cache over capacity, trimmed oldest entries"
            );
        } else if report.expired > 0 {
            tracing::trace!(expired = report.expired, "dropped expired cache entries");
        }
        report
    }

    /// Hand a snapshot to the writer; called with the store lock held so
    /// snapshots reach the writer in mutation order
    fn enqueue(&self, store: &CacheStore) -> Option<oneshot::Receiver<Result<()>>> {
        match store.to_snapshot() {
            Ok(snapshot) => Some(self.writer.submit(snapshot)),
            Err(e) => {
                tracing::warn!(error = %e, "could not serialize cache snapshot");
                None
            }
        }
    }

    async fn settle(&self, pending: Option<oneshot::Receiver<Result<()>>>) {
        let Some(pending) = pending else {
            return;
        };
        if let Err(e) = wait_for(pending, self.path()).await {
            tracing::warn!(error = %e, "cache snapshot not saved");
        }
    }
}

async fn wait_for(pending: oneshot::Receiver<Result<()>>, path: &Path) -> Result<()> {
    match pending.await {
        Ok(outcome) => outcome,
        Err(_) => Err(CacheError::WriterUnavailable {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> ResultCache {
        ResultCache::open(CacheConfig::at(dir.path().join("cache.json"))).unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);

        cache.set("user:1", &json!({"name": "Alice", "age": 30})).await;

        assert_eq!(cache.get("user:1"), Some(json!({"name": "Alice", "age": 30})));
        assert!(cache.contains("user:1"));
        assert!(!cache.contains("user:2"));
        assert_eq!(cache.get("user:2"), None);
    }

    #[tokio::test]
    async fn test_get_as_typed() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);

        cache.set("rows", &vec![1u32, 2, 3]).await;

        assert_eq!(cache.get_as::<Vec<u32>>("rows"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get_as::<String>("rows"), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);

        cache.set("k", &1).await;
        cache.set("k", &2).await;

        assert_eq!(cache.get("k"), Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ResultCache::open(
            CacheConfig::at(temp_dir.path().join("cache.json")).with_ttl(Duration::from_secs(1)),
        )
        .unwrap();

        cache.set("a", &1).await;
        assert_eq!(cache.get("a"), Some(json!(1)));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_keeps_most_recent() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ResultCache::open(
            CacheConfig::at(temp_dir.path().join("cache.json")).with_max_size(10),
        )
        .unwrap();

        for i in 0..15 {
            cache.set(&format!("k{i}"), &i).await;
            assert!(cache.len() <= 10);
        }

        for i in 8..15 {
            assert!(cache.contains(&format!("k{i}")), "k{i} should survive");
        }
        assert!(!cache.contains("k0"));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);

        cache.set("k", &"v").await;
        assert!(cache.delete("k").await);
        assert!(!cache.delete("k").await);
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test]
    async fn test_clear_and_keys() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);

        cache.set("a", &1).await;
        cache.set("b", &2).await;
        assert_eq!(cache.keys(), vec!["a".to_string(), "b".to_string()]);

        cache.clear().await;
        assert!(cache.keys().is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ResultCache::open(
            CacheConfig::at(temp_dir.path().join("cache.json")).with_max_size(4),
        )
        .unwrap();

        let empty = cache.stats();
        assert_eq!(empty.total_entries, 0);
        assert_eq!(empty.file_size_bytes, 0);

        cache.set("a", &1).await;
        cache.set("b", &2).await;

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 2);
        assert_eq!(stats.expired_entries, 0);
        assert_eq!(stats.max_size, 4);
        assert_eq!(stats.ttl_seconds, 3600);
        assert!((stats.usage_percent - 50.0).abs() < f64::EPSILON);
        assert!(stats.file_size_bytes > 0);
    }

    #[tokio::test]
    async fn test_stats_counts_expired_without_sweeping() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ResultCache::open(
            CacheConfig::at(temp_dir.path().join("cache.json")).with_ttl(Duration::from_secs(1)),
        )
        .unwrap();

        cache.set("a", &1).await;
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.expired_entries, 1);

        let report = cache.sweep().await;
        assert_eq!(report.expired, 1);
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[tokio::test]
    async fn test_flush_reports_storage_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let cache = ResultCache::open(CacheConfig::at(blocker.join("cache.json"))).unwrap();

        // fail-open: set succeeds in memory even though nothing reaches disk
        cache.set("k", &1).await;
        assert_eq!(cache.get("k"), Some(json!(1)));
        assert!(cache.flush().await.is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = CacheConfig::at(temp_dir.path().join("cache.json")).with_max_size(0);
        assert!(matches!(
            ResultCache::open(config),
            Err(CacheError::Configuration { .. })
        ));
    }
}
