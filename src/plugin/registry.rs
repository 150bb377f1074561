use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ScraperPlugin;
use crate::error::AppResult;

/// Persisted `{disabled_plugins: [name, …]}` document (§4.1). Missing file
/// means an empty set, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginPreferences {
    #[serde(default)]
    pub disabled_plugins: Vec<String>,
}

impl PluginPreferences {
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn disabled_set(&self) -> HashSet<String> {
        self.disabled_plugins.iter().cloned().collect()
    }
}

/// A constructor for a candidate plugin. Modeled as a fallible factory
/// rather than a pre-built instance so that a plugin that fails to
/// initialize (§4.1 failure semantics) can be skipped without aborting the
/// loader.
pub type PluginFactory = Box<dyn Fn() -> AppResult<Arc<dyn ScraperPlugin>> + Send + Sync>;

/// Discovers, filters, and holds the active set of scraper plugins (C1).
pub struct PluginRegistry {
    sources: HashMap<String, Arc<dyn ScraperPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Registers a plugin, keyed by its declared name. A later registration
    /// of the same name overwrites the earlier one.
    pub fn register(&mut self, plugin: Arc<dyn ScraperPlugin>) {
        self.sources.insert(plugin.name().to_string(), plugin);
    }

    /// Runs each factory, filters out disabled plugins and plugins whose
    /// declared languages don't intersect `requested_languages` (an empty
    /// request set means "no language filter"), and registers the rest.
    ///
    /// A factory that errors is skipped with a logged warning; the loader
    /// never aborts the process over one bad plugin.
    pub fn load(
        factories: Vec<PluginFactory>,
        disabled: &HashSet<String>,
        requested_languages: &HashSet<String>,
    ) -> Self {
        let mut registry = Self::new();
        for factory in factories {
            let plugin = match factory() {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("skipping plugin that failed to initialize: {e}");
                    continue;
                }
            };

            if disabled.contains(plugin.name()) {
                log::debug!("skipping disabled plugin '{}'", plugin.name());
                continue;
            }

            if !requested_languages.is_empty()
                && plugin.languages().is_disjoint(requested_languages)
            {
                log::debug!(
                    "skipping plugin '{}': no overlap with requested languages",
                    plugin.name()
                );
                continue;
            }

            registry.register(plugin);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ScraperPlugin>> {
        self.sources.get(name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn ScraperPlugin>> {
        self.sources.values().cloned().collect()
    }

    /// Sorted list of registered plugin names.
    pub fn active_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::CatalogSink;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct StubPlugin {
        name: String,
        languages: HashSet<String>,
    }

    #[async_trait]
    impl ScraperPlugin for StubPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn languages(&self) -> &HashSet<String> {
            &self.languages
        }

        async fn search_anime(
            &self,
            _query: &str,
            _sink: &dyn CatalogSink,
            _cancel: CancellationToken,
        ) -> AppResult<()> {
            Ok(())
        }

        async fn search_episodes(
            &self,
            _anime_title: &str,
            _url: &str,
            _params: &serde_json::Value,
            _sink: &dyn CatalogSink,
            _cancel: CancellationToken,
        ) -> AppResult<()> {
            Ok(())
        }

        async fn extract_stream(
            &self,
            _episode_url: &str,
            _cancel: CancellationToken,
        ) -> AppResult<Option<crate::catalog::types::VideoStream>> {
            Ok(None)
        }
    }

    fn stub(name: &str, langs: &[&str]) -> PluginFactory {
        let name = name.to_string();
        let languages: HashSet<String> = langs.iter().map(|s| s.to_string()).collect();
        Box::new(move || {
            Ok(Arc::new(StubPlugin {
                name: name.clone(),
                languages: languages.clone(),
            }) as Arc<dyn ScraperPlugin>)
        })
    }

    #[test]
    fn load_filters_disabled_plugins() {
        let factories = vec![stub("alpha", &["en"]), stub("beta", &["en"])];
        let disabled: HashSet<String> = ["beta".to_string()].into_iter().collect();
        let registry = PluginRegistry::load(factories, &disabled, &HashSet::new());
        assert_eq!(registry.active_sources(), vec!["alpha".to_string()]);
    }

    #[test]
    fn load_filters_by_language() {
        let factories = vec![stub("alpha", &["en"]), stub("beta", &["pt"])];
        let wanted: HashSet<String> = ["pt".to_string()].into_iter().collect();
        let registry = PluginRegistry::load(factories, &HashSet::new(), &wanted);
        assert_eq!(registry.active_sources(), vec!["beta".to_string()]);
    }

    #[test]
    fn load_keeps_all_when_no_language_filter() {
        let factories = vec![stub("alpha", &["en"]), stub("beta", &["pt"])];
        let registry = PluginRegistry::load(factories, &HashSet::new(), &HashSet::new());
        assert_eq!(registry.active_sources().len(), 2);
    }

    #[test]
    fn missing_preferences_file_is_empty_set() {
        let prefs = PluginPreferences::load(Path::new("/nonexistent/plugin_preferences.json"));
        assert!(prefs.disabled_plugins.is_empty());
    }

    #[test]
    fn register_overwrites_same_name() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(StubPlugin {
            name: "alpha".into(),
            languages: HashSet::new(),
        }));
        registry.register(Arc::new(StubPlugin {
            name: "alpha".into(),
            languages: ["en".to_string()].into_iter().collect(),
        }));
        assert_eq!(registry.active_sources(), vec!["alpha".to_string()]);
        assert_eq!(registry.get("alpha").unwrap().languages().len(), 1);
    }
}
