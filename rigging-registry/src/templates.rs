use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use rigging_common::error::Error;
use rigging_common::value::{ConfigMap, ConfigValue};

use crate::parser::load_document;

/// A named, reusable variable set a user can apply to a plugin
/// instance, distinct from sequence-sourced configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub name: String,
    pub variables: ConfigMap,
}

impl Template {
    fn from_doc(doc: &ConfigValue) -> Result<Self, Error> {
        let name = doc
            .get("name")
            .and_then(ConfigValue::as_str)
            .ok_or_else(|| Error::Validation("template needs a 'name'".to_string()))?
            .to_string();
        let variables = match doc.get("variables") {
            Some(ConfigValue::Map(m)) => m.clone(),
            Some(_) => {
                return Err(Error::Validation(format!(
                    "template '{name}': 'variables' must be a map"
                )));
            }
            None => ConfigMap::new(),
        };
        Ok(Template { name, variables })
    }
}

/// Per-plugin template collections, loaded from
/// `templates/<plugin>/<name>.yml`.
#[derive(Debug, Default)]
pub struct TemplateStore {
    by_plugin: BTreeMap<String, Vec<Template>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, plugin_name: impl Into<String>, template: Template) {
        self.by_plugin
            .entry(plugin_name.into())
            .or_default()
            .push(template);
    }

    /// Loads every `<dir>/<plugin>/*.yml`. Malformed template files are
    /// skipped with a warning.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, Error> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let plugin_dir = entry?.path();
            if !plugin_dir.is_dir() {
                continue;
            }
            let Some(plugin_name) = plugin_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let plugin_name = plugin_name.to_string();
            for file in std::fs::read_dir(&plugin_dir)? {
                let path = file?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("yml") {
                    continue;
                }
                match load_document(&path).and_then(|doc| Template::from_doc(&doc)) {
                    Ok(template) => {
                        self.insert(plugin_name.clone(), template);
                        loaded += 1;
                    }
                    Err(e) => {
                        warn!("Skipping template at {}: {}", path.display(), e);
                    }
                }
            }
        }
        Ok(loaded)
    }

    pub fn get(&self, plugin_name: &str, template_name: &str) -> Option<&Template> {
        self.by_plugin
            .get(plugin_name)?
            .iter()
            .find(|t| t.name == template_name)
    }

    pub fn list(&self, plugin_name: &str) -> &[Template] {
        self.by_plugin
            .get(plugin_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
