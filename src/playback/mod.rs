//! Playback orchestrator (C9) — racing stream resolution and progress sync.
//!
//! Grounded on the Python original's `Repository.search_player` (the
//! preferred-source-first race with a 15 s fast-path deadline, logged
//! under "CACHE DISABLED for video URLs") and on the teacher's
//! `modules::provider::domain::services::provider_orchestrator` fan-out
//! idiom for the actual task-racing shape. Progress sync against AniList
//! (PLANNING→CURRENT, COMPLETED→REPEATING promotion and sequel offers) is
//! grounded on `services/history_service.py::save_history_from_event`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::anilist::{AniListClient, MediaListStatus};
use crate::catalog::types::VideoStream;
use crate::history::HistoryStore;
use crate::plugin::registry::PluginRegistry;

const PREFERRED_SOURCE_DEADLINE: Duration = Duration::from_secs(15);

/// Outcome of a full-watch progress sync attempt (§4.9), surfaced to the
/// flow controller for a one-line status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Not authenticated, or no known anilist_id: history-only write.
    LocalOnly,
    /// Synced; `status_change` is set when a PLANNING/COMPLETED promotion
    /// happened alongside the progress update.
    Synced { status_change: Option<(MediaListStatus, MediaListStatus)> },
    /// Progress write failed and the token turned out to be invalid.
    AuthExpired,
    /// Progress write failed for some other reason; sync was attempted.
    SyncFailed,
}

/// Races plugin stream extractors and keeps history/AniList progress in
/// sync with what was actually watched (C9).
pub struct PlaybackOrchestrator {
    plugins: Arc<PluginRegistry>,
    anilist: Arc<AniListClient>,
    history: Arc<HistoryStore>,
    preferred_source: String,
}

impl PlaybackOrchestrator {
    pub fn new(
        plugins: Arc<PluginRegistry>,
        anilist: Arc<AniListClient>,
        history: Arc<HistoryStore>,
        preferred_source: String,
    ) -> Self {
        Self {
            plugins,
            anilist,
            history,
            preferred_source,
        }
    }

    /// Resolves a playable stream for `(url, source)` candidates, racing
    /// the preferred source first under a 15 s deadline, then falling back
    /// to an unbounded race across everything else (§4.9 steps 3-6).
    #[tracing::instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn resolve_stream(&self, candidates: &[(String, String)]) -> Option<VideoStream> {
        if candidates.is_empty() {
            return None;
        }

        let (preferred, other): (Vec<_>, Vec<_>) = candidates
            .iter()
            .cloned()
            .partition(|(_, source)| *source == self.preferred_source);

        if !preferred.is_empty() {
            if let Some(stream) =
                Self::race(Arc::clone(&self.plugins), preferred, Some(PREFERRED_SOURCE_DEADLINE)).await
            {
                return Some(stream);
            }
        }

        if other.is_empty() {
            return None;
        }
        Self::race(Arc::clone(&self.plugins), other, None).await
    }

    /// Spawns one extractor task per candidate and returns the first
    /// successful stream, cancelling the rest. A per-task panic or error is
    /// logged and treated as an ordinary loss (§4.9 "per-task isolation").
    #[tracing::instrument(skip(plugins, candidates), fields(tier = if deadline.is_some() { "preferred" } else { "fallback" }))]
    async fn race(
        plugins: Arc<PluginRegistry>,
        candidates: Vec<(String, String)>,
        deadline: Option<Duration>,
    ) -> Option<VideoStream> {
        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(candidates.len());
        for (url, source) in candidates {
            let Some(plugin) = plugins.get(&source) else {
                continue;
            };
            let cancel_child = cancel.child_token();
            handles.push(tokio::spawn(async move {
                match plugin.extract_stream(&url, cancel_child).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        log::warn!("plugin '{source}' stream extraction failed: {e}");
                        None
                    }
                }
            }));
        }

        if handles.is_empty() {
            return None;
        }

        let race_future = async {
            let mut remaining = handles;
            loop {
                if remaining.is_empty() {
                    return None;
                }
                let (result, _idx, rest) = futures::future::select_all(remaining).await;
                remaining = rest;
                if let Ok(Some(stream)) = result {
                    cancel.cancel();
                    for handle in &remaining {
                        handle.abort();
                    }
                    return Some(stream);
                }
            }
        };

        match deadline {
            Some(d) => tokio::time::timeout(d, race_future).await.ok().flatten(),
            None => race_future.await,
        }
    }

    /// Progress sync after a confirmed full watch (§4.9).
    ///
    /// Writes history unconditionally. If `anilist_id` is known and the
    /// client is authenticated, adds the anime to the list (status
    /// `CURRENT`) if absent, promotes `PLANNING`→`CURRENT` or
    /// `COMPLETED`→`REPEATING` if present, then updates progress.
    #[tracing::instrument(skip(self, source), fields(anime, episode_idx, anilist_id))]
    pub async fn sync_progress(
        &self,
        anime: &str,
        episode_idx: usize,
        anilist_id: Option<i64>,
        source: Option<String>,
        total_episodes: Option<usize>,
    ) -> SyncOutcome {
        let _ = self
            .history
            .set(anime, episode_idx, anilist_id, source, total_episodes)
            .await;

        let Some(id) = anilist_id else {
            return SyncOutcome::LocalOnly;
        };
        if !self.anilist.has_token().await {
            return SyncOutcome::LocalOnly;
        }

        let entry = self.anilist.list_entry(id).await;
        let status_change = match entry.as_ref().map(|e| e.status) {
            None => {
                self.anilist.add_to_list(id).await;
                None
            }
            Some(MediaListStatus::Planning) => {
                self.anilist.set_status(id, MediaListStatus::Current).await;
                Some((MediaListStatus::Planning, MediaListStatus::Current))
            }
            Some(MediaListStatus::Completed) => {
                self.anilist.set_status(id, MediaListStatus::Repeating).await;
                Some((MediaListStatus::Completed, MediaListStatus::Repeating))
            }
            Some(_) => None,
        };

        let episode_number = episode_idx as i64 + 1;
        if self.anilist.update_progress(id, episode_number).await {
            SyncOutcome::Synced { status_change }
        } else if self.anilist.viewer().await.is_none() {
            SyncOutcome::AuthExpired
        } else {
            SyncOutcome::SyncFailed
        }
    }

    /// On the last episode of `anilist_id`, looks up sequels to offer
    /// (§4.9 final step). Empty when there's no known anilist_id or no
    /// sequel relations.
    pub async fn offer_sequels(&self, anilist_id: Option<i64>) -> Vec<crate::anilist::Media> {
        match anilist_id {
            Some(id) => self.anilist.sequels(id).await,
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{CatalogSink, ScraperPlugin};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration as StdDuration;

    struct DelayedPlugin {
        name: String,
        delay: StdDuration,
        result: Option<VideoStream>,
    }

    #[async_trait]
    impl ScraperPlugin for DelayedPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn languages(&self) -> &HashSet<String> {
            static EMPTY: std::sync::OnceLock<HashSet<String>> = std::sync::OnceLock::new();
            EMPTY.get_or_init(HashSet::new)
        }

        async fn search_anime(
            &self,
            _query: &str,
            _sink: &dyn CatalogSink,
            _cancel: CancellationToken,
        ) -> crate::error::AppResult<()> {
            Ok(())
        }

        async fn search_episodes(
            &self,
            _anime_title: &str,
            _url: &str,
            _params: &serde_json::Value,
            _sink: &dyn CatalogSink,
            _cancel: CancellationToken,
        ) -> crate::error::AppResult<()> {
            Ok(())
        }

        async fn extract_stream(
            &self,
            _episode_url: &str,
            cancel: CancellationToken,
        ) -> crate::error::AppResult<Option<VideoStream>> {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => Ok(self.result.clone()),
                _ = cancel.cancelled() => Ok(None),
            }
        }
    }

    fn registry_with(plugins: Vec<Arc<dyn ScraperPlugin>>) -> Arc<PluginRegistry> {
        let mut registry = PluginRegistry::new();
        for p in plugins {
            registry.register(p);
        }
        Arc::new(registry)
    }

    fn orchestrator(plugins: Arc<PluginRegistry>, preferred: &str) -> PlaybackOrchestrator {
        let anilist = AniListClient::new(std::env::temp_dir().join("anicore-playback-test-token.json"));
        let mut history_path = std::env::temp_dir();
        history_path.push(format!("anicore-playback-test-{}", preferred));
        std::fs::create_dir_all(&history_path).ok();
        let history = Arc::new(HistoryStore::load(history_path.join("history.json")));
        PlaybackOrchestrator::new(plugins, anilist, history, preferred.to_string())
    }

    #[tokio::test]
    async fn preferred_source_wins_even_when_slower() {
        let preferred: Arc<dyn ScraperPlugin> = Arc::new(DelayedPlugin {
            name: "animefire".into(),
            delay: StdDuration::from_millis(200),
            result: Some(VideoStream::new("http://preferred/stream.m3u8")),
        });
        let other: Arc<dyn ScraperPlugin> = Arc::new(DelayedPlugin {
            name: "other".into(),
            delay: StdDuration::from_millis(20),
            result: Some(VideoStream::new("http://other/stream.m3u8")),
        });
        let plugins = registry_with(vec![preferred, other]);
        let orch = orchestrator(Arc::clone(&plugins), "animefire");

        let candidates = vec![
            ("http://a".to_string(), "animefire".to_string()),
            ("http://b".to_string(), "other".to_string()),
        ];
        let stream = orch.resolve_stream(&candidates).await.unwrap();
        assert_eq!(stream.url, "http://preferred/stream.m3u8");
    }

    #[tokio::test]
    async fn falls_back_to_other_sources_when_preferred_fails() {
        let preferred: Arc<dyn ScraperPlugin> = Arc::new(DelayedPlugin {
            name: "animefire".into(),
            delay: StdDuration::from_millis(10),
            result: None,
        });
        let other: Arc<dyn ScraperPlugin> = Arc::new(DelayedPlugin {
            name: "other".into(),
            delay: StdDuration::from_millis(10),
            result: Some(VideoStream::new("http://other/stream.m3u8")),
        });
        let plugins = registry_with(vec![preferred, other]);
        let orch = orchestrator(Arc::clone(&plugins), "animefire");

        let candidates = vec![
            ("http://a".to_string(), "animefire".to_string()),
            ("http://b".to_string(), "other".to_string()),
        ];
        let stream = orch.resolve_stream(&candidates).await.unwrap();
        assert_eq!(stream.url, "http://other/stream.m3u8");
    }

    #[tokio::test]
    async fn empty_candidates_returns_none() {
        let plugins = registry_with(vec![]);
        let orch = orchestrator(plugins, "animefire");
        assert!(orch.resolve_stream(&[]).await.is_none());
    }

    #[tokio::test]
    async fn sync_without_anilist_id_is_local_only() {
        let plugins = registry_with(vec![]);
        let orch = orchestrator(plugins, "animefire");
        let outcome = orch.sync_progress("Naruto", 3, None, None, None).await;
        assert_eq!(outcome, SyncOutcome::LocalOnly);
        assert!(orch.history.get("Naruto").await.is_some());
    }
}
