//! Watch-history store (C8).
//!
//! Grounded on the teacher's file-backed persistence idiom
//! (`infrastructure::database::Database` does whole-file rewrites under a
//! lock for its SQLite-adjacent config; the closer analogue for a flat JSON
//! store is `shared::utils::validation`'s "read, mutate, atomically
//! rewrite" pattern) generalized here to the distilled algorithm's exact
//! record shape and legacy-migration rule (SPEC_FULL.md §B, from
//! `services/history_service.py`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AppResult;

/// One anime's watch progress (§3 `HistoryRecord`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub timestamp: u64,
    pub episode_idx: usize,
    pub anilist_id: Option<i64>,
    pub source: Option<String>,
    pub total_episodes: Option<usize>,
}

impl HistoryRecord {
    pub fn new(
        episode_idx: usize,
        anilist_id: Option<i64>,
        source: Option<String>,
        total_episodes: Option<usize>,
    ) -> Self {
        Self {
            timestamp: now_unix(),
            episode_idx,
            anilist_id,
            source,
            total_episodes,
        }
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Raw on-disk shape a record may take: the current 5-tuple, or a legacy
/// record whose first field is a list of episode URLs (§4.8 migration
/// rule) rather than a timestamp.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Current(u64, usize, Option<i64>, Option<String>, Option<usize>),
    LegacyUrlList(Vec<String>, usize),
}

/// Persistent `anime_title → HistoryRecord` store (§4.8).
pub struct HistoryStore {
    path: PathBuf,
    records: Mutex<HashMap<String, HistoryRecord>>,
}

impl HistoryStore {
    /// Loads the store from `path`, migrating any legacy-shaped records
    /// in place (rewritten using the file's mtime, or now if unavailable)
    /// but not yet persisting the migration — callers get the migrated
    /// view immediately; the next `set`/`delete` persists it to disk.
    pub fn load(path: PathBuf) -> Self {
        let fallback_timestamp = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or_else(now_unix);

        let raw: HashMap<String, RawRecord> = std::fs::read_to_string(&path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default();

        let records = raw
            .into_iter()
            .map(|(title, record)| {
                let migrated = match record {
                    RawRecord::Current(timestamp, episode_idx, anilist_id, source, total_episodes) => HistoryRecord {
                        timestamp,
                        episode_idx,
                        anilist_id,
                        source,
                        total_episodes,
                    },
                    RawRecord::LegacyUrlList(_urls, episode_idx) => HistoryRecord {
                        timestamp: fallback_timestamp,
                        episode_idx,
                        anilist_id: None,
                        source: None,
                        total_episodes: None,
                    },
                };
                (title, migrated)
            })
            .collect();

        Self {
            path,
            records: Mutex::new(records),
        }
    }

    pub async fn get(&self, anime: &str) -> Option<HistoryRecord> {
        self.records.lock().await.get(anime).cloned()
    }

    /// Inserts or overwrites the record for `anime`, stamping a fresh
    /// timestamp, then rewrites the whole file.
    pub async fn set(
        &self,
        anime: &str,
        episode_idx: usize,
        anilist_id: Option<i64>,
        source: Option<String>,
        total_episodes: Option<usize>,
    ) -> AppResult<()> {
        let mut records = self.records.lock().await;
        records.insert(
            anime.to_string(),
            HistoryRecord::new(episode_idx, anilist_id, source, total_episodes),
        );
        Self::persist(&self.path, &records)
    }

    pub async fn delete(&self, anime: &str) -> AppResult<()> {
        let mut records = self.records.lock().await;
        records.remove(anime);
        Self::persist(&self.path, &records)
    }

    /// Entries sorted most-recently-watched first (§4.8).
    pub async fn list_sorted_by_timestamp_desc(&self) -> Vec<(String, HistoryRecord)> {
        let records = self.records.lock().await;
        let mut entries: Vec<(String, HistoryRecord)> =
            records.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));
        entries
    }

    fn persist(path: &Path, records: &HashMap<String, HistoryRecord>) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(records)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}
