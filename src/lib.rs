//! anicore: a terminal-driven mediator that aggregates anime scrapers,
//! resolves AniList identity, and drives playback.

pub mod anilist;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod history;
pub mod identity;
pub mod logging;
pub mod player;
pub mod playback;
pub mod plugin;
pub mod title;

use std::sync::Arc;

use anilist::AniListClient;
use cache::Cache;
use catalog::Catalog;
use config::{Settings, StatePaths};
use error::AppResult;
use flow::AppContext;
use history::HistoryStore;
use identity::{IdentityMappingStore, IdentityResolver};
use player::ExternalPlayerDriver;
use playback::PlaybackOrchestrator;
use plugin::registry::PluginRegistry;

/// Wires every component into an [`AppContext`] (§6 startup sequence):
/// opens the shard cache and migrates the legacy single-file cache if one
/// is found, loads the AniList token and identity mapping stores, builds
/// the plugin registry (the single `DebugPlugin` under `--debug`, since
/// real scraper implementations are out of scope), and loads history.
pub async fn bootstrap(settings: Settings, paths: StatePaths, debug: bool) -> AppResult<AppContext> {
    let cache = Arc::new(Cache::open(paths.cache_dir(), settings.cache.shard_count)?);
    cache
        .migrate_legacy(
            &paths.legacy_cache_file(),
            std::time::Duration::from_secs(settings.cache.clamped_duration_hours() * 3600),
        )
        .await?;

    let anilist = AniListClient::new(paths.anilist_token_file());
    let identity = Arc::new(IdentityResolver::new(
        Arc::clone(&cache),
        Arc::clone(&anilist),
        settings.search.clamped_fuzzy_threshold(),
    ));
    let mappings = Arc::new(IdentityMappingStore::load(paths.anilist_mappings_file()));

    let mut registry = PluginRegistry::new();
    if debug {
        registry.register(Arc::new(plugin::debug_plugin::DebugPlugin::new()));
    }
    let plugins = Arc::new(registry);

    let catalog = Catalog::new(
        Arc::clone(&plugins),
        Arc::clone(&cache),
        Arc::clone(&identity),
        std::time::Duration::from_secs(settings.cache.clamped_duration_hours() * 3600),
        settings.search.progressive_search_min_words,
        settings.search.auto_discover_identity,
    );

    let history = Arc::new(HistoryStore::load(paths.history_file()));
    let playback = PlaybackOrchestrator::new(
        Arc::clone(&plugins),
        Arc::clone(&anilist),
        Arc::clone(&history),
        settings.playback.preferred_source.clone(),
    );
    let player = ExternalPlayerDriver::new(settings.player.clone());

    Ok(AppContext {
        catalog,
        identity,
        mappings,
        anilist,
        history,
        playback,
        player,
        debug,
    })
}
