//! Identity resolver (C6): maps a scraper's title string onto an AniList id.
//!
//! Grounded on the teacher's
//! `modules::provider::domain::services::search_processor::similarity_strategy`
//! `HybridStrategy`/`JaroWinklerStrategy`/`LevenshteinStrategy` idiom — here
//! narrowed to the single normalized-Levenshtein ratio the distilled
//! algorithm specifies, scored against both romaji and english candidate
//! titles and the caller's own title.

pub mod mapping;

use std::sync::Arc;

use crate::anilist::AniListClient;
use crate::cache::{Cache, NEGATIVE_IDENTITY_TTL, POSITIVE_IDENTITY_TTL};

pub use mapping::{IdentityMapping, IdentityMappingStore};

const SEARCH_CANDIDATE_LIMIT: usize = 5;

pub struct IdentityResolver {
    cache: Arc<Cache>,
    anilist: Arc<AniListClient>,
    fuzzy_threshold: u8,
}

fn cache_key(scraper_title: &str) -> String {
    format!("anilist_id:{}", scraper_title.to_lowercase())
}

fn title_score(scraper_title: &str, candidate_title: Option<&str>) -> f64 {
    match candidate_title {
        Some(t) => strsim::normalized_levenshtein(&scraper_title.to_lowercase(), &t.to_lowercase()) * 100.0,
        None => 0.0,
    }
}

impl IdentityResolver {
    pub fn new(cache: Arc<Cache>, anilist: Arc<AniListClient>, fuzzy_threshold: u8) -> Self {
        Self {
            cache,
            anilist,
            fuzzy_threshold: fuzzy_threshold.clamp(70, 100),
        }
    }

    /// Resolves `scraper_title` to an AniList id, consulting (and
    /// populating) the identity cache. Returns `None` both for a cached
    /// negative result and for "no candidate cleared the threshold" — the
    /// distinction only matters for TTL selection, not for callers.
    pub async fn resolve(&self, scraper_title: &str) -> Option<i64> {
        let key = cache_key(scraper_title);
        if let Some(cached) = self.cache.get::<Option<i64>>(&key).await {
            return cached;
        }

        let candidates = self.anilist.search(scraper_title).await;
        let best = candidates
            .into_iter()
            .take(SEARCH_CANDIDATE_LIMIT)
            .map(|media| {
                let score = title_score(scraper_title, media.title.romaji.as_deref())
                    .max(title_score(scraper_title, media.title.english.as_deref()));
                (media.id, score)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let outcome = match best {
            Some((id, score)) if score >= self.fuzzy_threshold as f64 => Some(id),
            _ => None,
        };

        let ttl = if outcome.is_some() {
            POSITIVE_IDENTITY_TTL
        } else {
            NEGATIVE_IDENTITY_TTL
        };
        let _ = self.cache.set(&key, &outcome, ttl).await;

        outcome
    }
}
