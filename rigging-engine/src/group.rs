use tokio::sync::mpsc;
use tracing::{debug, warn};

use rigging_common::error::Error;
use rigging_common::field::{FieldSpec, ProviderArg};
use rigging_common::value::{ConfigMap, ConfigValue};

use crate::fields::{FieldEvent, FieldHandle, FieldRegistry};
use crate::graph::{DependencyGraph, initial_enabled_state};
use crate::providers::{ProviderRegistry, rows_to_default, rows_to_options};
use crate::retry::RetryQueue;
use crate::widget::widget_for;

/// The field set of one plugin instance (or the global SSH options
/// group): a registry of live fields, the dependency graph over them
/// and a retry queue for values that arrive before their field does.
///
/// One group is owned by one logical task; groups share nothing, so
/// distinct instances may be driven in parallel.
pub struct ConfigGroup {
    registry: FieldRegistry,
    graph: DependencyGraph,
    retry: RetryQueue,
}

impl ConfigGroup {
    pub fn new() -> Self {
        ConfigGroup {
            registry: FieldRegistry::new(),
            graph: DependencyGraph::new(),
            retry: RetryQueue::new(),
        }
    }

    /// Group whose field events are delivered to the given channel.
    pub fn with_events(events: mpsc::UnboundedSender<FieldEvent>) -> Self {
        ConfigGroup {
            registry: FieldRegistry::with_events(events),
            graph: DependencyGraph::new(),
            retry: RetryQueue::new(),
        }
    }

    /// Builds the widget for a declaration, applies its dynamic default
    /// and initial options, sets the initial enabled state from current
    /// sibling values and rebuilds the dependency indices.
    pub fn add_field(&mut self, spec: FieldSpec, providers: &ProviderRegistry) {
        let mut widget = widget_for(&spec);

        if let Some(decl) = &spec.dynamic_options {
            match providers.fetch(&decl.provider, &self.provider_args(&decl.args)) {
                Ok(rows) => {
                    let options =
                        rows_to_options(&rows, decl.value_key.as_deref(), decl.label_key.as_deref());
                    if let Some(updater) = widget.options_updater() {
                        updater.replace_options(options);
                    }
                }
                Err(e) => {
                    warn!(field_id = %spec.id, provider = %decl.provider, "Initial options fetch failed: {}", e);
                }
            }
        }

        if let Some(decl) = &spec.dynamic_default {
            match providers.fetch(&decl.provider, &self.provider_args(&decl.args)) {
                Ok(rows) => {
                    if let Some(default) = rows_to_default(&rows, decl.value_key.as_deref()) {
                        widget.set_value(&default);
                    }
                }
                Err(e) => {
                    warn!(field_id = %spec.id, provider = %decl.provider, "Dynamic default fetch failed: {}", e);
                }
            }
        }

        let field_id = spec.id.clone();
        let initially_enabled = spec
            .enabled_if
            .as_ref()
            .map(|decl| initial_enabled_state(&self.registry, decl))
            .unwrap_or(true);

        self.registry.register(FieldHandle::with_widget(spec, widget));
        if !initially_enabled {
            self.registry.set_enabled(&field_id, false);
        }
        self.graph.rebuild(&self.registry);
    }

    fn provider_args(&self, args: &[ProviderArg]) -> ConfigMap {
        args.iter()
            .map(|arg| {
                let value = self
                    .registry
                    .value_of(&arg.field_id)
                    .unwrap_or(ConfigValue::Null);
                (arg.param_name.clone(), value)
            })
            .collect()
    }

    pub fn remove_field(&mut self, field_id: &str) {
        self.registry.remove(field_id);
        self.graph.remove_field(field_id);
    }

    /// Validates the completed field set; call once all fields exist.
    pub fn analyze(&mut self) -> Result<(), Error> {
        self.graph.analyze(&self.registry)
    }

    /// Host-driven edit: applies the value and propagates it through
    /// the dependency graph.
    pub fn set_field_value(
        &mut self,
        providers: &ProviderRegistry,
        field_id: &str,
        value: &ConfigValue,
    ) -> bool {
        if !self.registry.set_value(field_id, value) {
            return false;
        }
        self.graph
            .on_field_changed(&mut self.registry, providers, field_id);
        true
    }

    /// Re-runs propagation for a field whose value changed outside the
    /// engine (e.g. the user typed into its widget).
    pub fn field_changed(&mut self, providers: &ProviderRegistry, field_id: &str) {
        self.graph
            .on_field_changed(&mut self.registry, providers, field_id);
    }

    /// Applies a set of predefined values (a template, or a saved
    /// config) through the retry queue: fields that are not ready yet
    /// pick their value up once they materialize. Keys may be field ids
    /// or declared variable names.
    pub fn apply_values(&mut self, values: &ConfigMap) {
        for (key, value) in values {
            let field_id = self.field_id_for(key);
            debug!(key = %key, field_id = %field_id, "Applying predefined value");
            self.retry
                .schedule(&mut self.registry, field_id, value.clone());
        }
    }

    fn field_id_for(&self, key: &str) -> String {
        if self.registry.contains(key) {
            return key.to_string();
        }
        self.registry
            .handles()
            .find(|h| h.spec.variable_name() == key)
            .map(|h| h.id().to_string())
            .unwrap_or_else(|| key.to_string())
    }

    /// Retries pending values whose backoff deadline has passed.
    pub fn run_pending(&mut self) -> usize {
        self.retry.run_due(&mut self.registry)
    }

    /// Awaits retry deadlines until nothing is pending.
    pub async fn drain_pending(&mut self) {
        self.retry.drain(&mut self.registry).await;
    }

    pub fn pending_count(&self) -> usize {
        self.retry.len()
    }

    pub fn field_value(&self, field_id: &str) -> Option<ConfigValue> {
        self.registry.value_of(field_id)
    }

    pub fn is_enabled(&self, field_id: &str) -> bool {
        self.registry
            .lookup(field_id)
            .map(FieldHandle::is_enabled)
            .unwrap_or(false)
    }

    pub fn contains(&self, field_id: &str) -> bool {
        self.registry.contains(field_id)
    }

    /// Current values of all enabled fields, keyed by variable name.
    pub fn current_values(&self) -> ConfigMap {
        self.registry
            .handles()
            .filter_map(|h| {
                h.value()
                    .map(|v| (h.spec.variable_name().to_string(), v))
            })
            .collect()
    }
}

impl Default for ConfigGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(yaml: &str) -> FieldSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_initial_enabled_state_from_siblings() {
        let providers = ProviderRegistry::new();
        let mut group = ConfigGroup::new();
        group.add_field(spec("id: use_proxy\ntype: checkbox\ndefault: false"), &providers);
        group.add_field(
            spec("id: proxy_host\nenabled_if:\n  field: use_proxy\n  value: true"),
            &providers,
        );
        assert!(!group.is_enabled("proxy_host"));

        group.set_field_value(&providers, "use_proxy", &ConfigValue::Bool(true));
        assert!(group.is_enabled("proxy_host"));
    }

    #[test]
    fn test_dynamic_default_applied_at_add() {
        let mut providers = ProviderRegistry::new();
        providers.register("default_iface", |_args: &ConfigMap| {
            Ok(vec![ConfigValue::from("eth0")])
        });
        let mut group = ConfigGroup::new();
        group.add_field(
            spec("id: iface\ndynamic_default:\n  provider: default_iface"),
            &providers,
        );
        assert_eq!(group.field_value("iface"), Some(ConfigValue::from("eth0")));
    }

    #[test]
    fn test_apply_values_matches_variable_names() {
        let providers = ProviderRegistry::new();
        let mut group = ConfigGroup::new();
        group.add_field(spec("id: mode\nvariable: scan_mode"), &providers);

        let values: ConfigMap = serde_yaml::from_str("scan_mode: deep").unwrap();
        group.apply_values(&values);
        assert_eq!(group.pending_count(), 0);
        assert_eq!(group.field_value("mode"), Some(ConfigValue::from("deep")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_values_waits_for_late_fields() {
        let providers = ProviderRegistry::new();
        let mut group = ConfigGroup::new();

        let values: ConfigMap = serde_yaml::from_str("target: /srv").unwrap();
        group.apply_values(&values);
        assert_eq!(group.pending_count(), 1);

        group.add_field(spec("id: target"), &providers);
        group.drain_pending().await;
        assert_eq!(group.field_value("target"), Some(ConfigValue::from("/srv")));
    }
}
