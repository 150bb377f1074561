//! Sharded on-disk cache with TTL (C5).
//!
//! Grounded on the teacher's `infrastructure::cache::provider_cache::ProviderCache`
//! (an in-memory TTL cache with hit/miss counters): the same
//! entry-with-`expire_at` shape and "expired reads count as misses" behavior
//! are kept, but storage moves from an in-memory map to shards persisted as
//! individual JSON files, since this crate has no long-lived server process
//! to hold a warm in-memory cache across invocations. Each shard is guarded
//! by its own `tokio::sync::Mutex` rather than the teacher's `DashMap`,
//! since every shard access here is already followed by a disk read/write
//! that dwarfs any lock-free win `DashMap` would buy.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AppResult;

pub const NEGATIVE_IDENTITY_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const POSITIVE_IDENTITY_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const METADATA_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: serde_json::Value,
    expire_at: u64,
}

impl StoredEntry {
    fn is_expired(&self, now: u64) -> bool {
        now >= self.expire_at
    }
}

#[derive(Default)]
struct Shard {
    loaded: bool,
    entries: HashMap<String, StoredEntry>,
}

/// A sharded key/value cache backed by one JSON file per shard.
///
/// Readers tolerate schema drift: any entry that fails to deserialize, or
/// has expired, is treated as a cache miss rather than an error.
pub struct Cache {
    dir: PathBuf,
    shards: Vec<Arc<Mutex<Shard>>>,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Cache {
    /// Opens (without yet reading) a cache rooted at `dir`, split across
    /// `shard_count` shards (minimum 4, per §4.5).
    pub fn open(dir: impl Into<PathBuf>, shard_count: usize) -> AppResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let shard_count = shard_count.max(4);
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(Shard::default())))
            .collect();
        Ok(Self { dir, shards })
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    fn shard_path(&self, idx: usize) -> PathBuf {
        self.dir.join(format!("shard_{idx:04}.json"))
    }

    async fn ensure_loaded(&self, idx: usize) {
        let mut shard = self.shards[idx].lock().await;
        if shard.loaded {
            return;
        }
        shard.entries = match std::fs::read_to_string(self.shard_path(idx)) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };
        shard.loaded = true;
    }

    async fn persist(&self, idx: usize, shard: &Shard) -> AppResult<()> {
        let data = serde_json::to_string(&shard.entries)?;
        std::fs::write(self.shard_path(idx), data)?;
        Ok(())
    }

    /// Returns the cached value for `key`, or `None` on a miss, an expired
    /// entry, or a value that no longer deserializes to `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let idx = self.shard_index(key);
        self.ensure_loaded(idx).await;
        let shard = self.shards[idx].lock().await;
        let entry = shard.entries.get(key)?;
        if entry.is_expired(now_unix()) {
            return None;
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    /// Stores `value` under `key` with the given time-to-live, overwriting
    /// any previous entry.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> AppResult<()> {
        let idx = self.shard_index(key);
        self.ensure_loaded(idx).await;
        let mut shard = self.shards[idx].lock().await;
        shard.entries.insert(
            key.to_string(),
            StoredEntry {
                value: serde_json::to_value(value)?,
                expire_at: now_unix() + ttl.as_secs(),
            },
        );
        self.persist(idx, &shard).await
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let idx = self.shard_index(key);
        self.ensure_loaded(idx).await;
        let mut shard = self.shards[idx].lock().await;
        if shard.entries.remove(key).is_some() {
            self.persist(idx, &shard).await?;
        }
        Ok(())
    }

    async fn is_empty(&self) -> bool {
        for idx in 0..self.shards.len() {
            self.ensure_loaded(idx).await;
            if !self.shards[idx].lock().await.entries.is_empty() {
                return false;
            }
        }
        true
    }

    /// One-time migration from a legacy single-file JSON store (§4.5). If
    /// `legacy_path` exists and this cache is currently empty, the legacy
    /// file's top-level object is rehydrated key-by-key with a long TTL,
    /// then the legacy file is renamed with a `.backup` suffix so the
    /// migration never repeats.
    pub async fn migrate_legacy(&self, legacy_path: &Path, ttl: Duration) -> AppResult<()> {
        if !legacy_path.exists() || !self.is_empty().await {
            return Ok(());
        }

        let raw = std::fs::read_to_string(legacy_path)?;
        let legacy: HashMap<String, serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(_) => return Ok(()),
        };

        for (key, value) in legacy {
            self.set(&key, &value, ttl).await?;
        }

        let backup_path = legacy_path.with_extension("json.backup");
        std::fs::rename(legacy_path, backup_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("anicore-cache-test-{name}-{}", now_unix()));
        dir
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tmp_dir("roundtrip");
        let cache = Cache::open(&dir, 4).unwrap();
        cache
            .set("search:naruto", &vec!["a".to_string(), "b".to_string()], Duration::from_secs(60))
            .await
            .unwrap();
        let got: Option<Vec<String>> = cache.get("search:naruto").await;
        assert_eq!(got, Some(vec!["a".to_string(), "b".to_string()]));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let dir = tmp_dir("expired");
        let cache = Cache::open(&dir, 4).unwrap();
        cache
            .set("anilist_id:foo", &42i64, Duration::from_secs(0))
            .await
            .unwrap();
        // Already expired the instant it's written (ttl=0, now >= expire_at).
        let got: Option<i64> = cache.get("anilist_id:foo").await;
        assert_eq!(got, None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn malformed_entry_is_a_miss_not_an_error() {
        let dir = tmp_dir("malformed");
        let cache = Cache::open(&dir, 4).unwrap();
        cache.set("k", &"a string", Duration::from_secs(60)).await.unwrap();
        let got: Option<i64> = cache.get("k").await;
        assert_eq!(got, None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dir = tmp_dir("missing");
        let cache = Cache::open(&dir, 4).unwrap();
        let got: Option<String> = cache.get("nope").await;
        assert_eq!(got, None);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn migrate_legacy_rehydrates_once_and_backs_up() {
        let dir = tmp_dir("migrate");
        std::fs::create_dir_all(&dir).unwrap();
        let legacy_path = dir.join("scraper_cache.json");
        std::fs::write(&legacy_path, r#"{"search:foo": ["x"]}"#).unwrap();

        let cache_dir = dir.join("shards");
        let cache = Cache::open(&cache_dir, 4).unwrap();
        cache
            .migrate_legacy(&legacy_path, Duration::from_secs(60))
            .await
            .unwrap();

        let got: Option<Vec<String>> = cache.get("search:foo").await;
        assert_eq!(got, Some(vec!["x".to_string()]));
        assert!(!legacy_path.exists());
        assert!(dir.join("scraper_cache.json.backup").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
