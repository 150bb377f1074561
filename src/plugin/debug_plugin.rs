//! The single hard-wired plugin loaded by `--debug` (§6). Scraper
//! HTML-parsing implementations are explicitly out of scope (§1); this
//! fixture stands in for one so the pipeline — fan-out, dedup, identity
//! resolution, episode listing, playback — can be exercised end to end
//! without a network-backed scraper.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{CatalogSink, ScraperPlugin};
use crate::catalog::types::VideoStream;
use crate::error::AppResult;

pub struct DebugPlugin {
    languages: HashSet<String>,
}

impl DebugPlugin {
    pub fn new() -> Self {
        Self {
            languages: ["en".to_string()].into_iter().collect(),
        }
    }
}

impl Default for DebugPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScraperPlugin for DebugPlugin {
    fn name(&self) -> &str {
        "debug"
    }

    fn languages(&self) -> &HashSet<String> {
        &self.languages
    }

    async fn search_anime(
        &self,
        query: &str,
        sink: &dyn CatalogSink,
        _cancel: CancellationToken,
    ) -> AppResult<()> {
        if query.to_lowercase().contains("naruto") {
            sink.add_anime(
                "Naruto".to_string(),
                "http://debug.local/anime/naruto".to_string(),
                self.name().to_string(),
                serde_json::Value::Null,
            )
            .await;
        }
        Ok(())
    }

    async fn search_episodes(
        &self,
        anime_title: &str,
        _url: &str,
        _params: &serde_json::Value,
        sink: &dyn CatalogSink,
        _cancel: CancellationToken,
    ) -> AppResult<()> {
        let titles = vec!["Episode 1".to_string(), "Episode 2".to_string(), "Episode 3".to_string()];
        let urls = vec![
            "http://debug.local/episode/1".to_string(),
            "http://debug.local/episode/2".to_string(),
            "http://debug.local/episode/3".to_string(),
        ];
        sink.add_episode_list(anime_title.to_string(), titles, urls, self.name().to_string())
            .await;
        Ok(())
    }

    async fn extract_stream(
        &self,
        episode_url: &str,
        _cancel: CancellationToken,
    ) -> AppResult<Option<VideoStream>> {
        Ok(Some(VideoStream::new(format!("{episode_url}.m3u8"))))
    }
}
