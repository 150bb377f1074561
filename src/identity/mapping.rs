use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AppResult;

/// A human's chosen catalog entry for a known AniList id (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityMapping {
    pub scraper_title: String,
    pub search_title: String,
}

/// Durable `anilist_id → {scraper_title, search_title}` store, keyed by the
/// id's string form since JSON object keys must be strings.
pub struct IdentityMappingStore {
    path: PathBuf,
    mappings: Mutex<HashMap<String, IdentityMapping>>,
}

impl IdentityMappingStore {
    pub fn load(path: PathBuf) -> Self {
        let mappings = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            path,
            mappings: Mutex::new(mappings),
        }
    }

    pub async fn get(&self, anilist_id: i64) -> Option<IdentityMapping> {
        self.mappings.lock().await.get(&anilist_id.to_string()).cloned()
    }

    /// Records the user's choice for `anilist_id`. If a mapping already
    /// exists, its `search_title` is preserved rather than overwritten —
    /// that field anchors "switch source" (re-running the original query)
    /// even after the user has picked a different scraper entry.
    pub async fn record(
        &self,
        anilist_id: i64,
        scraper_title: String,
        search_title: String,
    ) -> AppResult<()> {
        let mut mappings = self.mappings.lock().await;
        let key = anilist_id.to_string();
        let search_title = match mappings.get(&key) {
            Some(existing) => existing.search_title.clone(),
            None => search_title,
        };
        mappings.insert(
            key,
            IdentityMapping {
                scraper_title,
                search_title,
            },
        );
        Self::persist(&self.path, &mappings)
    }

    fn persist(path: &Path, mappings: &HashMap<String, IdentityMapping>) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(mappings)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("anicore-identity-test-{name}"));
        dir.join("anilist_mappings.json")
    }

    #[tokio::test]
    async fn record_then_get_round_trips() {
        let path = tmp_path("roundtrip");
        let store = IdentityMappingStore::load(path.clone());
        store
            .record(101, "Naruto (AnimeFire)".to_string(), "naruto".to_string())
            .await
            .unwrap();
        let got = store.get(101).await.unwrap();
        assert_eq!(got.scraper_title, "Naruto (AnimeFire)");
        assert_eq!(got.search_title, "naruto");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn search_title_is_preserved_across_source_switch() {
        let path = tmp_path("preserve");
        let store = IdentityMappingStore::load(path.clone());
        store
            .record(202, "Bleach (AnimeFire)".to_string(), "bleach tybw".to_string())
            .await
            .unwrap();
        store
            .record(202, "Bleach (GoAnimes)".to_string(), "irrelevant".to_string())
            .await
            .unwrap();
        let got = store.get(202).await.unwrap();
        assert_eq!(got.scraper_title, "Bleach (GoAnimes)");
        assert_eq!(got.search_title, "bleach tybw");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let store = IdentityMappingStore::load(PathBuf::from("/nonexistent/anilist_mappings.json"));
        assert!(store.get(1).await.is_none());
    }
}
