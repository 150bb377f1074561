//! Scraper plugin contract (C2) and registry (C1).
//!
//! Grounded on the teacher's provider abstraction
//! (`modules::provider::domain::repositories::media_provider_repo` and
//! `domain::traits::anime_provider_client::AnimeProviderClient`): a small
//! `async_trait` capability interface registered into a manager keyed by
//! name, generalized here from "one provider per well-known enum variant"
//! to "any number of plugins registered by string name".

pub mod debug_plugin;
pub mod registry;

use std::collections::HashSet;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::catalog::types::VideoStream;
use crate::error::AppResult;

/// Sink the catalog exposes to plugins. Plugins call back into this during
/// `search_anime`/`search_episodes`; they hold no other shared state.
#[async_trait]
pub trait CatalogSink: Send + Sync {
    async fn add_anime(&self, title: String, url: String, source: String, params: serde_json::Value);

    async fn add_episode_list(
        &self,
        anime_title: String,
        titles: Vec<String>,
        urls: Vec<String>,
        source: String,
    );
}

/// Capability set each scraper plugin implements (§4.2).
///
/// Plugins must not mutate global state beyond calling the sink methods and
/// must respect `cancel` on every blocking I/O read — the aggregator cancels
/// outstanding tasks when a search deadline elapses, and the playback
/// orchestrator cancels losing extractors as soon as one source wins a race.
#[async_trait]
pub trait ScraperPlugin: Send + Sync {
    /// Unique, lowercase ascii plugin name.
    fn name(&self) -> &str;

    /// Languages this plugin can serve content in (e.g. `"en"`, `"pt"`).
    fn languages(&self) -> &HashSet<String>;

    /// Discover candidates for `query`, reporting hits via `sink.add_anime`.
    async fn search_anime(
        &self,
        query: &str,
        sink: &dyn CatalogSink,
        cancel: CancellationToken,
    ) -> AppResult<()>;

    /// Produce the episode list for a previously-discovered anime, reporting
    /// it via `sink.add_episode_list`.
    async fn search_episodes(
        &self,
        anime_title: &str,
        url: &str,
        params: &serde_json::Value,
        sink: &dyn CatalogSink,
        cancel: CancellationToken,
    ) -> AppResult<()>;

    /// Resolve an episode page into a playable stream. Must return promptly
    /// when `cancel` fires.
    async fn extract_stream(
        &self,
        episode_url: &str,
        cancel: CancellationToken,
    ) -> AppResult<Option<VideoStream>>;
}
