use serde::{Deserialize, Serialize};

/// One `(url, source, params)` row contributed by a single plugin for a
/// catalog title. Immutable after it is added to an [`AnimeEntry`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimeCandidate {
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl AnimeCandidate {
    pub fn new(url: impl Into<String>, source: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
            params,
        }
    }
}

/// An ordered episode title/url list produced by one source for one anime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeList {
    pub anime_title: String,
    pub titles: Vec<String>,
    pub urls: Vec<String>,
    pub source: String,
}

impl EpisodeList {
    /// Validates the invariant from §3: equal-length parallel arrays and
    /// http(s) urls.
    pub fn is_valid(&self) -> bool {
        self.titles.len() == self.urls.len()
            && self
                .urls
                .iter()
                .all(|u| u.starts_with("http://") || u.starts_with("https://"))
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// A resolved playable stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoStream {
    pub url: String,
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
}

const KNOWN_STREAM_EXTENSIONS: &[&str] = &[".m3u8", ".mp4", ".mkv", ".avi", ".webm"];

impl VideoStream {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: std::collections::BTreeMap::new(),
        }
    }

    /// `false` doesn't invalidate the stream — unusual shapes are
    /// permitted, only flagged (§3).
    pub fn has_expected_extension(&self) -> bool {
        let lower = self.url.to_lowercase();
        KNOWN_STREAM_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(ext))
    }
}

/// A normalized-title key plus the ordered candidates contributed by each
/// source that turned up the same anime (§3). Invariant: every candidate
/// under one entry shares the same dedup-normalized title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AnimeEntry {
    pub candidates: Vec<AnimeCandidate>,
}

impl AnimeEntry {
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .candidates
            .iter()
            .map(|c| c.source.clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        sources.sort();
        sources
    }
}

/// Last-search audit object, overwritten on each search (§3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchMetadata {
    pub original_query: String,
    pub used_query: String,
    pub used_words: usize,
    pub total_words: usize,
    pub min_words: usize,
    pub source: SearchMetadataSource,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMetadataSource {
    #[default]
    Scraper,
    Cache,
}
