//! In-memory key → entry map and its JSON snapshot form.

use crate::entry::CacheEntry;
use crate::errors::{CacheError, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use taskmill_core::CACHE_TRIM_RATIO;

/// Entries removed by one eviction sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub evicted: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

/// Entry count kept after a capacity trim
///
/// Never zero, so the entry that pushed the store over the limit survives.
pub fn trim_target(max_size: usize) -> usize {
    ((max_size as f64 * CACHE_TRIM_RATIO).floor() as usize).max(1)
}

/// Key → entry map, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStore {
    entries: IndexMap<String, CacheEntry>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Insert or overwrite; an overwritten key moves to the back
    pub fn insert(&mut self, key: impl Into<String>, entry: CacheEntry) {
        let key = key.into();
        self.entries.shift_remove(&key);
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries younger than `ttl` at `now`
    pub fn count_valid(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_expired(now, ttl))
            .count()
    }

    /// Drop expired entries, then trim to [`trim_target`] if over `max_size`
    ///
    /// Trimming removes the oldest entries by `created_at`; ties keep their
    /// insertion order.
    pub fn sweep(&mut self, now: DateTime<Utc>, ttl: Duration, max_size: usize) -> SweepReport {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, ttl));
        let expired = before - self.entries.len();

        let mut evicted = 0;
        if self.entries.len() > max_size {
            let keep = trim_target(max_size);
            self.entries
                .sort_by(|_, a, _, b| a.created_at.cmp(&b.created_at));
            evicted = self.entries.len() - keep;
            self.entries.drain(..evicted);
        }

        SweepReport { expired, evicted }
    }

    /// Serialize as a JSON object of `key -> { value, created_at }`
    pub fn to_snapshot(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.entries)?)
    }

    /// Parse a snapshot, skipping individual entries that do not decode
    pub fn from_snapshot(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        let raw: IndexMap<String, Value> = serde_json::from_slice(bytes)?;
        let mut entries = IndexMap::with_capacity(raw.len());
        for (key, value) in raw {
            match serde_json::from_value::<CacheEntry>(value) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping unreadable cache entry"),
            }
        }
        Ok(Self { entries })
    }

    /// Read a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| CacheError::io(path, "read snapshot", e))?;
        Self::from_snapshot(&bytes).map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const HOUR: Duration = Duration::from_secs(3600);

    fn at(base: DateTime<Utc>, offset_secs: i64) -> CacheEntry {
        CacheEntry::new(json!(offset_secs), base + chrono::Duration::seconds(offset_secs))
    }

    #[test]
    fn test_trim_target() {
        assert_eq!(trim_target(10), 8);
        assert_eq!(trim_target(1000), 800);
        assert_eq!(trim_target(3), 2);
        assert_eq!(trim_target(1), 1);
    }

    #[test]
    fn test_overwrite_moves_key_to_back() {
        let now = Utc::now();
        let mut store = CacheStore::new();
        store.insert("a", at(now, 0));
        store.insert("b", at(now, 1));
        store.insert("a", at(now, 2));

        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(store.get("a").unwrap().value, json!(2));
    }

    #[test]
    fn test_sweep_drops_expired() {
        let now = Utc::now();
        let mut store = CacheStore::new();
        store.insert("old", at(now, -7200));
        store.insert("edge", at(now, -3600));
        store.insert("fresh", at(now, -10));

        let report = store.sweep(now, HOUR, 100);

        assert_eq!(report, SweepReport { expired: 2, evicted: 0 });
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["fresh"]);
    }

    #[test]
    fn test_sweep_trims_oldest_first() {
        let now = Utc::now();
        let mut store = CacheStore::new();
        for i in 0..11 {
            store.insert(format!("k{i}"), at(now, i));
        }

        let report = store.sweep(now + chrono::Duration::seconds(20), HOUR, 10);

        assert_eq!(report.evicted, 3);
        assert_eq!(store.len(), 8);
        assert!(store.get("k0").is_none());
        assert!(store.get("k2").is_none());
        assert!(store.get("k3").is_some());
        assert!(store.get("k10").is_some());
    }

    #[test]
    fn test_sweep_sorts_by_created_at_not_insertion() {
        let now = Utc::now();
        let mut store = CacheStore::new();
        // inserted newest first
        store.insert("newest", at(now, 30));
        store.insert("middle", at(now, 20));
        store.insert("oldest", at(now, 10));

        store.sweep(now + chrono::Duration::seconds(40), HOUR, 2);

        assert_eq!(store.len(), 1);
        assert!(store.get("newest").is_some());
    }

    #[test]
    fn test_snapshot_format() {
        let now = Utc::now();
        let mut store = CacheStore::new();
        store.insert("k", CacheEntry::new(json!({"rows": [1, 2]}), now));

        let bytes = store.to_snapshot().unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["k"]["value"], json!({"rows": [1, 2]}));
        assert!(doc["k"]["created_at"].is_string());

        assert_eq!(CacheStore::from_snapshot(&bytes).unwrap(), store);
    }

    #[test]
    fn test_snapshot_skips_bad_entries() {
        let snapshot = br#"{
            "good": {"value": 1, "created_at": "2026-01-01T00:00:00Z"},
            "bad": {"data": 2, "ts": 17000000}
        }"#;

        let store = CacheStore::from_snapshot(snapshot).unwrap();
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["good"]);
    }

    #[test]
    fn test_snapshot_rejects_non_object() {
        assert!(CacheStore::from_snapshot(b"[1, 2, 3]").is_err());
        assert!(CacheStore::from_snapshot(b"not json").is_err());
    }

    proptest! {
        #[test]
        fn prop_sweep_respects_capacity(
            max_size in 1usize..40,
            offsets in prop::collection::vec(0i64..10_000, 0..120),
        ) {
            let base = Utc::now();
            let now = base + chrono::Duration::seconds(10_000);
            let mut store = CacheStore::new();

            for (i, offset) in offsets.iter().enumerate() {
                store.insert(format!("k{i}"), at(base, *offset));
                store.sweep(now, HOUR * 24, max_size);

                prop_assert!(store.len() <= max_size);
                prop_assert_eq!(store.count_valid(now, HOUR * 24), store.len());
            }
        }

        #[test]
        fn prop_latest_insert_survives(
            max_size in 1usize..20,
            count in 1usize..80,
        ) {
            let base = Utc::now();
            let mut store = CacheStore::new();

            for i in 0..count {
                let key = format!("k{i}");
                store.insert(key.clone(), at(base, i as i64));
                store.sweep(base + chrono::Duration::seconds(i as i64), HOUR, max_size);
                prop_assert!(store.get(&key).is_some());
            }
        }
    }
}
