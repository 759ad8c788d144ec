mod matcher;

pub use matcher::EntryMatcher;

use std::collections::BTreeMap;

use tracing::debug;

use rigging_common::instance::PluginInstanceRef;
use rigging_common::resolved::{ResolvedPluginConfig, SPECIAL_ATTR_KEYS};
use rigging_common::value::{ConfigMap, ConfigValue, merge_over};
use rigging_registry::sequence::SequenceIndex;
use rigging_registry::settings_store::SettingsProvider;

/// Merges configuration from every source into one record per plugin
/// instance. Priority, lowest to highest: declared field defaults,
/// prior config for the same instance key, matched sequence entry,
/// explicit override.
///
/// Resolution is stateless per call: matching consumption is rebuilt
/// inside `resolve`, so the same inputs always produce the same output.
pub struct ConfigResolver<'a> {
    index: &'a SequenceIndex,
    settings: &'a dyn SettingsProvider,
    prior: BTreeMap<String, ResolvedPluginConfig>,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(index: &'a SequenceIndex, settings: &'a dyn SettingsProvider) -> Self {
        ConfigResolver {
            index,
            settings,
            prior: BTreeMap::new(),
        }
    }

    /// Seeds resolution with configs from an earlier pass (or a saved
    /// run), merged below sequence and override sources.
    pub fn with_prior(mut self, prior: BTreeMap<String, ResolvedPluginConfig>) -> Self {
        self.prior = prior;
        self
    }

    pub fn resolve(
        &self,
        instances: &[PluginInstanceRef],
    ) -> BTreeMap<String, ResolvedPluginConfig> {
        let mut resolved = BTreeMap::new();
        let mut occurrence: BTreeMap<String, usize> = BTreeMap::new();
        let mut matchers: BTreeMap<String, EntryMatcher<'a>> = BTreeMap::new();

        for instance in instances {
            if instance.is_pseudo() {
                debug!(plugin = %instance.plugin_name, "Skipping pseudo-entry");
                continue;
            }

            let occurrence_index = {
                let counter = occurrence.entry(instance.plugin_name.clone()).or_insert(0);
                let index = *counter;
                *counter += 1;
                index
            };

            let record = self.resolve_one(instance, occurrence_index, &mut matchers);
            resolved.insert(record.instance_key(), record);
        }

        resolved
    }

    fn resolve_one(
        &self,
        instance: &PluginInstanceRef,
        occurrence_index: usize,
        matchers: &mut BTreeMap<String, EntryMatcher<'a>>,
    ) -> ResolvedPluginConfig {
        let settings = self.settings.settings(&instance.plugin_name);
        let mut config = ConfigMap::new();
        let mut special_attrs = ConfigMap::new();

        // Base: declared field defaults, keyed by each field's variable
        // name.
        if let Some(settings) = &settings {
            for field in &settings.config_fields {
                if let Some(default) = &field.default {
                    config.insert(field.variable_name().to_string(), default.clone());
                }
            }
        }

        // Priority 1: config already resolved for this exact instance.
        if let Some(prior) = self.prior.get(&instance.instance_key()) {
            merge_over(&mut config, &prior.config);
            merge_over(&mut special_attrs, &prior.special_attrs);
        }

        // Priority 2: the best-matching sequence entry, bound at most
        // once per entry across all instances of this pass.
        let matcher = matchers
            .entry(instance.plugin_name.clone())
            .or_insert_with(|| EntryMatcher::new(self.index.entries_for(&instance.plugin_name)));
        if let Some(entry) = matcher.best_match(instance.override_config.as_ref(), occurrence_index)
        {
            merge_over(&mut config, &entry.config);
            merge_over(&mut special_attrs, &entry.special_attrs);
        } else {
            debug!(
                plugin = %instance.plugin_name,
                occurrence_index,
                "No sequence entry matched"
            );
        }

        // Priority 3: the explicit override wins over everything.
        if let Some(overrides) = &instance.override_config {
            merge_over(&mut config, overrides);
        }

        // Out-of-band keys that ended up in the merged config move to
        // the attribute map; the override is the last writer, so it can
        // override lifted attributes too.
        for key in SPECIAL_ATTR_KEYS {
            if let Some(value) = config.remove(key) {
                special_attrs.insert(key.to_string(), value);
            }
        }

        let supports_remote = settings.as_ref().map(|s| s.remote_execution).unwrap_or(false);
        let requests_remote = special_attrs
            .get("remote_execution")
            .and_then(ConfigValue::as_bool_lenient)
            .unwrap_or(false);

        let display_name = special_attrs
            .get("show_name")
            .and_then(ConfigValue::as_str)
            .map(str::to_string)
            .or_else(|| settings.as_ref().map(|s| s.display_name().to_string()))
            .unwrap_or_else(|| instance.plugin_name.clone());

        let icon = special_attrs
            .get("icon")
            .and_then(ConfigValue::as_str)
            .map(str::to_string)
            .or_else(|| settings.as_ref().and_then(|s| s.icon.clone()));

        ResolvedPluginConfig {
            plugin_name: instance.plugin_name.clone(),
            instance_id: instance.instance_id.clone(),
            display_name,
            icon,
            config,
            special_attrs,
            remote_execution: supports_remote && requests_remote,
        }
    }
}
