use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use rigging_common::error::Error;
use rigging_common::settings::PluginSettings;

use crate::parser::load_document;

/// Source of plugin settings documents, consulted by the resolver for
/// declared field defaults.
pub trait SettingsProvider {
    fn settings(&self, plugin_name: &str) -> Option<Arc<PluginSettings>>;
}

/// In-memory settings cache, constructed by the caller and threaded
/// through explicitly. Lifetime is tied to one run; `invalidate`
/// forces a reload on the next `load_dir`.
#[derive(Debug, Default)]
pub struct SettingsStore {
    cache: BTreeMap<String, Arc<PluginSettings>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, settings: PluginSettings) {
        self.cache
            .insert(settings.name.clone(), Arc::new(settings));
    }

    /// Loads every `<dir>/<plugin>/settings.yml` found under `dir`.
    /// A plugin directory with a malformed settings document is skipped
    /// with a warning; the rest of the directory still loads.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, Error> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let settings_path = path.join("settings.yml");
            if !settings_path.exists() {
                continue;
            }
            match load_document(&settings_path).and_then(|doc| PluginSettings::parse(&doc)) {
                Ok(mut settings) => {
                    if settings.name.is_empty() {
                        if let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) {
                            settings.name = dir_name.to_string();
                        }
                    }
                    debug!(plugin = %settings.name, "Loaded plugin settings");
                    self.insert(settings);
                    loaded += 1;
                }
                Err(e) => {
                    warn!("Skipping plugin settings at {}: {}", settings_path.display(), e);
                }
            }
        }
        Ok(loaded)
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.cache.keys().map(String::as_str)
    }
}

impl SettingsProvider for SettingsStore {
    fn settings(&self, plugin_name: &str) -> Option<Arc<PluginSettings>> {
        self.cache.get(plugin_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_plugin(dir: &Path, plugin: &str, body: &str) {
        let plugin_dir = dir.join(plugin);
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join("settings.yml"), body).unwrap();
    }

    #[test]
    fn test_load_dir_reads_plugin_settings() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(
            tmp.path(),
            "scan",
            "name: scan\nconfig_fields:\n  - id: mode\n",
        );
        write_plugin(tmp.path(), "report", "config_fields: []\n");

        let mut store = SettingsStore::new();
        assert_eq!(store.load_dir(tmp.path()).unwrap(), 2);
        assert!(store.settings("scan").is_some());
        // Name falls back to the directory name when the document has none.
        assert!(store.settings("report").is_some());
    }

    #[test]
    fn test_malformed_settings_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write_plugin(tmp.path(), "good", "name: good\n");
        write_plugin(tmp.path(), "bad", "config_fields: [:::\n");

        let mut store = SettingsStore::new();
        assert_eq!(store.load_dir(tmp.path()).unwrap(), 1);
        assert!(store.settings("good").is_some());
        assert!(store.settings("bad").is_none());
    }

    #[test]
    fn test_invalidate_clears_cache() {
        let mut store = SettingsStore::new();
        store.insert(PluginSettings {
            name: "scan".to_string(),
            ..Default::default()
        });
        assert!(store.settings("scan").is_some());
        store.invalidate();
        assert!(store.settings("scan").is_none());
    }
}
