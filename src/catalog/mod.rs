//! Aggregating catalog (C4) — the search core.
//!
//! Grounded on the teacher's
//! `modules::provider::domain::services::provider_orchestrator`/`search_results_processor`
//! fan-out-then-merge idiom, narrowed to the distilled algorithm's exact
//! contract: cache-first lookup, adaptive per-attempt deadline, progressive
//! word-prefix reduction, and a single mutex guarding the three in-memory
//! maps a search mutates (§4.4, §9 "singleton aggregating catalog").

pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::Cache;
use crate::identity::IdentityResolver;
use crate::plugin::registry::PluginRegistry;
use crate::plugin::CatalogSink;
use crate::title::normalizer::{dedup_normalize, reduce_query, search_filter_normalize};

pub use types::{AnimeCandidate, AnimeEntry, EpisodeList, SearchMetadata, SearchMetadataSource, VideoStream};

/// Serialized shape written to/read from the `search:<query>` cache key —
/// a plain `title -> candidate rows` map, matching §4.5's "full catalog
/// snapshot" description.
type CachedSearch = HashMap<String, Vec<AnimeCandidate>>;

#[derive(Default)]
struct CatalogState {
    /// Insertion order of keys in `anime_to_candidates`, so iteration (e.g.
    /// the linear scan in `add_anime`) is deterministic like the source's
    /// insertion-ordered dict.
    order: Vec<String>,
    anime_to_candidates: HashMap<String, AnimeEntry>,
    norm_index: HashMap<String, String>,
    anime_episodes: HashMap<String, Vec<EpisodeList>>,
    anime_to_anilist_id: HashMap<String, i64>,
    last_search_metadata: SearchMetadata,
}

impl CatalogState {
    fn clear_search_results(&mut self) {
        self.order.clear();
        self.anime_to_candidates.clear();
        self.norm_index.clear();
        self.anime_episodes.clear();
        // anime_to_anilist_id deliberately survives a clear: it is a
        // best-effort memo across attempts within the same `search` call,
        // not per-attempt state.
    }

    fn add_anime(&mut self, title: String, url: String, source: String, params: serde_json::Value) {
        let normalized = dedup_normalize(&title);
        for key in &self.order {
            if self.norm_index.get(key) == Some(&normalized) {
                self.anime_to_candidates
                    .get_mut(key)
                    .expect("order and anime_to_candidates stay in sync")
                    .candidates
                    .push(AnimeCandidate::new(url, source, params));
                return;
            }
        }
        self.norm_index.insert(title.clone(), normalized);
        self.anime_to_candidates.insert(
            title.clone(),
            AnimeEntry {
                candidates: vec![AnimeCandidate::new(url, source, params)],
            },
        );
        self.order.push(title);
    }

    fn add_episode_list(&mut self, list: EpisodeList) {
        if !list.is_valid() {
            log::warn!(
                "rejecting episode list from '{}' for '{}': titles/urls length mismatch or non-http(s) url",
                list.source,
                list.anime_title
            );
            return;
        }
        self.anime_episodes
            .entry(list.anime_title.clone())
            .or_default()
            .push(list);
    }
}

/// Selects the adaptive per-attempt deadline from the word count of the
/// partial query being tried this round (§4.4 step 2c).
fn adaptive_deadline(word_count: usize) -> Duration {
    match word_count {
        0 | 1 | 2 => Duration::from_secs(10),
        3 | 4 => Duration::from_secs(15),
        _ => Duration::from_secs(20),
    }
}

/// Shared, process-wide aggregating catalog (§9: "model it as a single
/// owned value passed explicitly", not a global). Cheap to clone — wrap in
/// `Arc` once at startup and hand the `Arc` to the flow controller and
/// anything else that needs to search or read it.
pub struct Catalog {
    plugins: Arc<PluginRegistry>,
    cache: Arc<Cache>,
    identity: Arc<IdentityResolver>,
    cache_ttl: Duration,
    min_words: usize,
    auto_discover_identity: bool,
    state: Mutex<CatalogState>,
}

impl Catalog {
    pub fn new(
        plugins: Arc<PluginRegistry>,
        cache: Arc<Cache>,
        identity: Arc<IdentityResolver>,
        cache_ttl: Duration,
        min_words: usize,
        auto_discover_identity: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            plugins,
            cache,
            identity,
            cache_ttl,
            min_words: min_words.max(1),
            auto_discover_identity,
            state: Mutex::new(CatalogState::default()),
        })
    }

    fn cache_key(query: &str) -> String {
        format!("search:{}", query.to_lowercase())
    }

    /// The search core (§4.4). Cache-first; on a miss, progressively
    /// shrinks the query's word-prefix until a plugin turns up a result or
    /// the floor is hit.
    pub async fn search(self: &Arc<Self>, query: &str, verbose: bool) {
        let key = Self::cache_key(query);
        if let Some(cached) = self.cache.get::<CachedSearch>(&key).await {
            let mut state = self.state.lock().await;
            state.clear_search_results();
            for (title, candidates) in cached {
                for candidate in candidates {
                    state.add_anime(title.clone(), candidate.url, candidate.source, candidate.params);
                }
            }
            let total_words = query.split_whitespace().count();
            state.last_search_metadata = SearchMetadata {
                original_query: query.to_string(),
                used_query: query.to_string(),
                used_words: total_words,
                total_words,
                min_words: self.min_words,
                source: SearchMetadataSource::Cache,
            };
            drop(state);
            self.auto_discover().await;
            return;
        }

        let total_words = query.split_whitespace().count().max(1);
        let attempts = reduce_query(query, self.min_words);
        let mut found = false;

        for partial_query in &attempts {
            {
                let mut state = self.state.lock().await;
                state.clear_search_results();
            }

            let word_count = partial_query.split_whitespace().count();
            let deadline = adaptive_deadline(word_count);
            self.fan_out(partial_query, deadline, verbose).await;

            let non_empty = {
                let state = self.state.lock().await;
                !state.anime_to_candidates.is_empty()
            };

            if non_empty {
                let mut state = self.state.lock().await;
                state.last_search_metadata = SearchMetadata {
                    original_query: query.to_string(),
                    used_query: partial_query.clone(),
                    used_words: word_count,
                    total_words,
                    min_words: self.min_words,
                    source: SearchMetadataSource::Scraper,
                };
                found = true;
                break;
            }
        }

        self.auto_discover().await;

        if found {
            let snapshot: CachedSearch = {
                let state = self.state.lock().await;
                state
                    .anime_to_candidates
                    .iter()
                    .map(|(title, entry)| (title.clone(), entry.candidates.clone()))
                    .collect()
            };
            let _ = self.cache.set(&key, &snapshot, self.cache_ttl).await;
        }
    }

    /// Fans `partial_query` out to every registered plugin concurrently,
    /// sharing a single deadline. When the deadline elapses, outstanding
    /// plugin tasks are aborted rather than awaited — any `add_anime` calls
    /// they already made remain visible in catalog state (§4.4, §5).
    async fn fan_out(self: &Arc<Self>, partial_query: &str, deadline: Duration, verbose: bool) {
        let plugins = self.plugins.all();
        if plugins.is_empty() {
            return;
        }

        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            let catalog = Arc::clone(self);
            let query = partial_query.to_string();
            let cancel_child = cancel.child_token();
            let name = plugin.name().to_string();
            handles.push(tokio::spawn(async move {
                if let Err(e) = plugin
                    .search_anime(&query, catalog.as_ref() as &dyn CatalogSink, cancel_child)
                    .await
                {
                    log::warn!("plugin '{name}' search failed: {e}");
                }
            }));
        }

        let joined = futures::future::join_all(handles.iter_mut());
        if tokio::time::timeout(deadline, joined).await.is_err() {
            if verbose {
                log::info!("search deadline ({deadline:?}) elapsed for '{partial_query}', cancelling outstanding plugins");
            }
            cancel.cancel();
            for handle in &handles {
                handle.abort();
            }
        }
    }

    /// Resolves AniList ids for any catalog entry that doesn't have one yet
    /// (§4.4 step 3). Runs unconditionally after both the cache-hit and
    /// scraper paths.
    async fn auto_discover(self: &Arc<Self>) {
        if !self.auto_discover_identity {
            return;
        }
        let missing: Vec<String> = {
            let state = self.state.lock().await;
            state
                .order
                .iter()
                .filter(|title| !state.anime_to_anilist_id.contains_key(title.as_str()))
                .cloned()
                .collect()
        };
        for title in missing {
            if let Some(id) = self.identity.resolve(&title).await {
                let mut state = self.state.lock().await;
                state.anime_to_anilist_id.insert(title, id);
            }
        }
    }

    /// Ranked `"Title [src1, src2]"` listing (§4.4). With `original_query`,
    /// entries are scored by ascii-lowercase Levenshtein ratio and sorted
    /// descending, ties broken alphabetically by the decorated string;
    /// otherwise sorted alphabetically by title.
    pub async fn titles_with_sources(&self, filter: Option<&str>, original_query: Option<&str>) -> Vec<String> {
        let state = self.state.lock().await;
        let normalized_filter = filter.map(search_filter_normalize);

        let mut rows: Vec<(String, String)> = state
            .order
            .iter()
            .filter(|title| {
                normalized_filter
                    .as_ref()
                    .map(|f| search_filter_normalize(title).contains(f.as_str()))
                    .unwrap_or(true)
            })
            .map(|title| {
                let entry = &state.anime_to_candidates[title];
                let decorated = format!("{} [{}]", title, entry.sources().join(", "));
                (decorated, title.clone())
            })
            .collect();

        if let Some(query) = original_query {
            let query_lower = query.to_lowercase();
            let mut scored: Vec<(f64, String, String)> = rows
                .into_iter()
                .map(|(decorated, title)| {
                    let score = strsim::normalized_levenshtein(&query_lower, &title.to_lowercase());
                    (score, decorated, title)
                })
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
            scored.into_iter().map(|(_, decorated, _)| decorated).collect()
        } else {
            rows.sort_by(|a, b| a.1.cmp(&b.1));
            rows.into_iter().map(|(decorated, _)| decorated).collect()
        }
    }

    /// Substring-filtered, ascending-sorted plain title list (§4.4).
    pub async fn titles(&self, filter: Option<&str>) -> Vec<String> {
        let state = self.state.lock().await;
        let filter_lower = filter.map(|f| f.to_lowercase());
        let mut titles: Vec<String> = state
            .order
            .iter()
            .filter(|title| {
                filter_lower
                    .as_ref()
                    .map(|f| title.to_lowercase().contains(f.as_str()))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        titles.sort();
        titles
    }

    pub async fn candidates_for(&self, anime: &str) -> Vec<AnimeCandidate> {
        self.state
            .lock()
            .await
            .anime_to_candidates
            .get(anime)
            .map(|e| e.candidates.clone())
            .unwrap_or_default()
    }

    pub async fn anilist_id_for(&self, anime: &str) -> Option<i64> {
        self.state.lock().await.anime_to_anilist_id.get(anime).copied()
    }

    pub async fn record_anilist_id(&self, anime: &str, id: i64) {
        self.state
            .lock()
            .await
            .anime_to_anilist_id
            .insert(anime.to_string(), id);
    }

    pub async fn last_search_metadata(&self) -> SearchMetadata {
        self.state.lock().await.last_search_metadata.clone()
    }

    /// Fans `search_episodes` out to every candidate's plugin (optionally
    /// filtered to one source), joining all before returning (§4.4).
    pub async fn search_episodes(self: &Arc<Self>, anime: &str, source_filter: Option<&str>) {
        let candidates = self.candidates_for(anime).await;
        let mut handles = Vec::new();
        for candidate in candidates {
            if let Some(filter) = source_filter {
                if candidate.source != filter {
                    continue;
                }
            }
            let Some(plugin) = self.plugins.get(&candidate.source) else {
                continue;
            };
            let catalog = Arc::clone(self);
            let anime_title = anime.to_string();
            let url = candidate.url.clone();
            let params = candidate.params.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = plugin
                    .search_episodes(
                        &anime_title,
                        &url,
                        &params,
                        catalog.as_ref() as &dyn CatalogSink,
                        CancellationToken::new(),
                    )
                    .await
                {
                    log::warn!("plugin '{}' episode search failed: {e}", candidate.source);
                }
            }));
        }
        futures::future::join_all(handles).await;
    }

    /// Among all per-source episode-title lists for `anime`, returns the
    /// longest, unreversed (§4.4, §5 ordering guarantee).
    pub async fn episode_list(&self, anime: &str) -> Option<EpisodeList> {
        let state = self.state.lock().await;
        state
            .anime_episodes
            .get(anime)?
            .iter()
            .max_by_key(|list| list.len())
            .cloned()
    }

    /// The first `(url, source)` whose list has `episode_number` (1-based).
    pub async fn episode_url_and_source(&self, anime: &str, episode_number: usize) -> Option<(String, String)> {
        if episode_number < 1 {
            return None;
        }
        let state = self.state.lock().await;
        let lists = state.anime_episodes.get(anime)?;
        for list in lists {
            if list.urls.len() >= episode_number {
                return Some((list.urls[episode_number - 1].clone(), list.source.clone()));
            }
        }
        None
    }
}

#[async_trait::async_trait]
impl CatalogSink for Catalog {
    async fn add_anime(&self, title: String, url: String, source: String, params: serde_json::Value) {
        self.state.lock().await.add_anime(title, url, source, params);
    }

    async fn add_episode_list(&self, anime_title: String, titles: Vec<String>, urls: Vec<String>, source: String) {
        self.state.lock().await.add_episode_list(EpisodeList {
            anime_title,
            titles,
            urls,
            source,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::ScraperPlugin;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration as StdDuration;

    struct FixedPlugin {
        name: String,
        hits: Vec<(String, String)>,
        delay: StdDuration,
    }

    #[async_trait]
    impl ScraperPlugin for FixedPlugin {
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
            sink: &dyn CatalogSink,
            cancel: CancellationToken,
        ) -> crate::error::AppResult<()> {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
            for (title, url) in &self.hits {
                sink.add_anime(title.clone(), url.clone(), self.name.clone(), serde_json::Value::Null)
                    .await;
            }
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
            _cancel: CancellationToken,
        ) -> crate::error::AppResult<Option<VideoStream>> {
            Ok(None)
        }
    }

    fn tmp_cache_dir(name: &str) -> Arc<Cache> {
        let mut dir = std::env::temp_dir();
        dir.push(format!("anicore-catalog-test-{name}"));
        Arc::new(Cache::open(dir, 4).unwrap())
    }

    fn test_catalog(plugins: Vec<Arc<dyn ScraperPlugin>>) -> Arc<Catalog> {
        let mut registry = PluginRegistry::new();
        for p in plugins {
            registry.register(p);
        }
        let cache = tmp_cache_dir(&format!("{:?}", std::time::SystemTime::now()));
        let anilist = crate::anilist::AniListClient::new(std::env::temp_dir().join("anicore-catalog-test-token.json"));
        let identity = Arc::new(IdentityResolver::new(Arc::clone(&cache), anilist, 90));
        Catalog::new(Arc::new(registry), cache, identity, Duration::from_secs(60), 1, false)
    }

    #[tokio::test]
    async fn add_anime_dedups_identical_normalized_titles() {
        let catalog = test_catalog(vec![]);
        catalog.add_anime("Foo: Part 1".into(), "http://a".into(), "s1".into(), serde_json::Value::Null).await;
        catalog.add_anime("Foo Season 1".into(), "http://b".into(), "s2".into(), serde_json::Value::Null).await;
        let titles = catalog.titles(None).await;
        assert_eq!(titles.len(), 1);
        let candidates = catalog.candidates_for(&titles[0]).await;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].source, "s1");
        assert_eq!(candidates[1].source, "s2");
    }

    #[tokio::test]
    async fn add_anime_keeps_distinct_normalized_titles_separate() {
        let catalog = test_catalog(vec![]);
        catalog.add_anime("Foo".into(), "http://a".into(), "s1".into(), serde_json::Value::Null).await;
        catalog.add_anime("Bar".into(), "http://b".into(), "s1".into(), serde_json::Value::Null).await;
        assert_eq!(catalog.titles(None).await.len(), 2);
    }

    #[tokio::test]
    async fn progressive_reduce_finds_result_on_shorter_prefix() {
        let plugin: Arc<dyn ScraperPlugin> = Arc::new(FixedPlugin {
            name: "p".into(),
            hits: vec![("Spy x Family".into(), "http://a".into())],
            delay: StdDuration::from_millis(5),
        });
        let catalog = test_catalog(vec![plugin]);
        catalog.search("Spy x Family Season 2 Part 2", false).await;
        let meta = catalog.last_search_metadata().await;
        assert_eq!(meta.source, SearchMetadataSource::Scraper);
        assert!(catalog.titles(None).await.contains(&"Spy x Family".to_string()));
    }

    #[tokio::test]
    async fn ranking_prefers_closer_title_match() {
        let catalog = test_catalog(vec![]);
        catalog.add_anime("Dandadan".into(), "http://a".into(), "s1".into(), serde_json::Value::Null).await;
        catalog
            .add_anime("Dandadan Season 2".into(), "http://b".into(), "s1".into(), serde_json::Value::Null)
            .await;
        let ranked = catalog.titles_with_sources(None, Some("Dandadan")).await;
        assert!(ranked[0].starts_with("Dandadan ["));
    }

    #[tokio::test]
    async fn episode_list_returns_longest_unreversed() {
        let catalog = test_catalog(vec![]);
        catalog
            .add_episode_list(
                "Naruto".into(),
                vec!["Ep 1".into()],
                vec!["http://a/1".into()],
                "s1".into(),
            )
            .await;
        catalog
            .add_episode_list(
                "Naruto".into(),
                vec!["Ep 1".into(), "Ep 2".into()],
                vec!["http://b/1".into(), "http://b/2".into()],
                "s2".into(),
            )
            .await;
        let list = catalog.episode_list("Naruto").await.unwrap();
        assert_eq!(list.titles, vec!["Ep 1".to_string(), "Ep 2".to_string()]);
        assert_eq!(list.source, "s2");
    }

    #[tokio::test]
    async fn episode_list_rejects_mismatched_lengths() {
        let catalog = test_catalog(vec![]);
        catalog
            .add_episode_list(
                "Naruto".into(),
                vec!["Ep 1".into(), "Ep 2".into()],
                vec!["http://a/1".into()],
                "s1".into(),
            )
            .await;
        assert!(catalog.episode_list("Naruto").await.is_none());
    }

    #[tokio::test]
    async fn episode_url_and_source_picks_first_list_with_that_episode() {
        let catalog = test_catalog(vec![]);
        catalog
            .add_episode_list(
                "Naruto".into(),
                vec!["Ep 1".into()],
                vec!["http://a/1".into()],
                "s1".into(),
            )
            .await;
        catalog
            .add_episode_list(
                "Naruto".into(),
                vec!["Ep 1".into(), "Ep 2".into()],
                vec!["http://b/1".into(), "http://b/2".into()],
                "s2".into(),
            )
            .await;
        let (url, source) = catalog.episode_url_and_source("Naruto", 2).await.unwrap();
        assert_eq!(url, "http://b/2");
        assert_eq!(source, "s2");
    }

    #[tokio::test]
    async fn deadline_cancels_slow_plugin_and_returns_promptly() {
        let plugin: Arc<dyn ScraperPlugin> = Arc::new(FixedPlugin {
            name: "slow".into(),
            hits: vec![("Never Arrives".into(), "http://a".into())],
            delay: StdDuration::from_secs(30),
        });
        let catalog = test_catalog(vec![plugin]);
        let started = std::time::Instant::now();
        catalog.fan_out("x", StdDuration::from_millis(50), false).await;
        assert!(started.elapsed() < StdDuration::from_secs(2));
        assert!(catalog.titles(None).await.is_empty());
    }
}
