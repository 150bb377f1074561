use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// AniList section of [`Settings`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AniListSettings {
    pub client_id: String,
    pub client_secret: String,
}

impl Default for AniListSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

/// Cache section. TTLs are expressed in hours for searches/episode lists,
/// matching the user-facing knob described in the base spec; identity and
/// metadata TTLs are fixed per §4.5/§4.6 and not user-configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub duration_hours: u64,
    pub shard_count: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            // The source carries two TTL spellings (6h and 168h); per the
            // preserved ambiguity in the base spec we default to the longer one.
            duration_hours: 168,
            shard_count: 8,
        }
    }
}

impl CacheSettings {
    pub fn clamped_duration_hours(&self) -> u64 {
        self.duration_hours.clamp(1, 720)
    }
}

/// Search section: progressive-reduce floor and fuzzy acceptance threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub progressive_search_min_words: usize,
    pub fuzzy_threshold: u8,
    pub auto_discover_identity: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            progressive_search_min_words: 1,
            fuzzy_threshold: 90,
            auto_discover_identity: true,
        }
    }
}

impl SearchSettings {
    pub fn clamped_fuzzy_threshold(&self) -> u8 {
        self.fuzzy_threshold.clamp(70, 100)
    }
}

/// Playback section. An empty `preferred_source` makes the "no preferred
/// source" case well-defined: a single-tier race across all sources (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub preferred_source: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            preferred_source: "animefire".to_string(),
        }
    }
}

/// External player invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub binary: String,
    pub extra_args: Vec<String>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            binary: "mpv".to_string(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub anilist: AniListSettings,
    pub cache: CacheSettings,
    pub search: SearchSettings,
    pub playback: PlaybackSettings,
    pub player: PlayerSettings,
}

const ENV_PREFIX: &str = "ANICORE";

impl Settings {
    /// Load defaults, then an optional `config.toml` in the state directory,
    /// then a local `.env`, then `ANICORE__SECTION__KEY` environment
    /// overrides — in that precedence order, lowest to highest.
    pub fn load(state_dir: &PathBuf) -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let config_path = state_dir.join("config.toml");
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?);

        if config_path.exists() {
            builder = builder.add_source(config::File::from(config_path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

/// Resolves the OS-appropriate per-user state directory and the well-known
/// file paths under it (§6).
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn resolve() -> AppResult<Self> {
        let dirs = ProjectDirs::from("", "", "anicore").ok_or_else(|| {
            AppError::Fatal("could not resolve a per-user state directory".to_string())
        })?;
        let root = dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            AppError::Fatal(format!(
                "could not create state directory {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn history_file(&self) -> PathBuf {
        self.root.join("history.json")
    }

    pub fn anilist_token_file(&self) -> PathBuf {
        self.root.join("anilist_token.json")
    }

    pub fn anilist_mappings_file(&self) -> PathBuf {
        self.root.join("anilist_mappings.json")
    }

    pub fn plugin_preferences_file(&self) -> PathBuf {
        self.root.join("plugin_preferences.json")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn legacy_cache_file(&self) -> PathBuf {
        self.root.join("scraper_cache.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_duration_is_clamped() {
        let mut s = CacheSettings::default();
        s.duration_hours = 5000;
        assert_eq!(s.clamped_duration_hours(), 720);
        s.duration_hours = 0;
        assert_eq!(s.clamped_duration_hours(), 1);
    }

    #[test]
    fn fuzzy_threshold_is_clamped() {
        let mut s = SearchSettings::default();
        s.fuzzy_threshold = 10;
        assert_eq!(s.clamped_fuzzy_threshold(), 70);
        s.fuzzy_threshold = 255;
        assert_eq!(s.clamped_fuzzy_threshold(), 100);
    }

    #[test]
    fn defaults_match_spec_long_ttl() {
        let s = CacheSettings::default();
        assert_eq!(s.duration_hours, 168);
    }
}
