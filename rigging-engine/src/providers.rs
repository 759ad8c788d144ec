use std::collections::BTreeMap;

use rigging_common::error::Error;
use rigging_common::field::SelectOption;
use rigging_common::value::{ConfigMap, ConfigValue};

/// Host-registered source of dynamically-computed option rows. Also
/// serves dynamic defaults: a default is the first row's value.
///
/// Providers run synchronously within a propagation step; a slow
/// provider blocks the group it serves, nothing else.
pub trait OptionsProvider: Send + Sync {
    /// Computes rows for the given arguments (keyed by the declared
    /// `param_name`). Rows may be scalars or maps; the caller projects
    /// them into options via the declaration's value/label keys.
    fn fetch(&self, args: &ConfigMap) -> Result<Vec<ConfigValue>, Error>;
}

impl<F> OptionsProvider for F
where
    F: Fn(&ConfigMap) -> Result<Vec<ConfigValue>, Error> + Send + Sync,
{
    fn fetch(&self, args: &ConfigMap) -> Result<Vec<ConfigValue>, Error> {
        self(args)
    }
}

/// Fixed name-to-provider map, populated by the host at startup. Field
/// declarations reference providers by name only; no code is loaded
/// dynamically.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn OptionsProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: impl OptionsProvider + 'static) {
        self.providers.insert(name.into(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn OptionsProvider> {
        self.providers.get(name).map(Box::as_ref)
    }

    pub fn fetch(&self, name: &str, args: &ConfigMap) -> Result<Vec<ConfigValue>, Error> {
        self.get(name)
            .ok_or_else(|| Error::Provider(format!("no provider registered as '{name}'")))?
            .fetch(args)
    }
}

/// Projects provider rows into selectable options. Map-shaped rows use
/// the declared value/label keys; scalar rows are their own label.
pub fn rows_to_options(
    rows: &[ConfigValue],
    value_key: Option<&str>,
    label_key: Option<&str>,
) -> Vec<SelectOption> {
    rows.iter()
        .filter_map(|row| match (row.as_map(), value_key) {
            (Some(_), Some(key)) => {
                let value = row.get(key)?.clone();
                let label = label_key
                    .and_then(|lk| row.get(lk))
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| value.to_string());
                Some(SelectOption { label, value })
            }
            _ => SelectOption::from_value(row),
        })
        .collect()
}

/// Extracts a dynamic default from provider rows: the first row,
/// projected through the declared value key when present.
pub fn rows_to_default(rows: &[ConfigValue], value_key: Option<&str>) -> Option<ConfigValue> {
    let first = rows.first()?;
    match (first.as_map(), value_key) {
        (Some(_), Some(key)) => first.get(key).cloned(),
        _ => Some(first.clone()),
    }
}
