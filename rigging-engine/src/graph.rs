use std::collections::BTreeMap;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, warn};

use rigging_common::error::Error;
use rigging_common::field::{DependsOn, DynamicOptions, EnabledIf};
use rigging_common::value::{ConfigMap, ConfigValue};

use crate::fields::FieldRegistry;
use crate::providers::{ProviderRegistry, rows_to_options};

/// Bidirectional dependency indices for one configuration group.
///
/// Forward maps answer "what does this field declare"; reverse maps
/// answer "who must be recomputed when this field changes", so a change
/// costs O(dependents), not O(all fields).
#[derive(Default)]
pub struct DependencyGraph {
    enabled_if: BTreeMap<String, EnabledIf>,
    depends_on: BTreeMap<String, DependsOn>,
    dynamic_options: BTreeMap<String, DynamicOptions>,

    rev_enabled_if: BTreeMap<String, Vec<String>>,
    rev_depends_on: BTreeMap<String, Vec<String>>,
    rev_dynamic_options: BTreeMap<String, Vec<String>>,

    /// Single-flight guard: re-entrant propagation is a no-op, which is
    /// what makes cyclic declarations terminate.
    propagating: bool,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds every index from the registry's current field set.
    /// Lenient about unresolved references so the graph can be rebuilt
    /// after each field addition during group construction; call
    /// `analyze` once the set is complete to surface bad references.
    pub fn rebuild(&mut self, registry: &FieldRegistry) {
        self.enabled_if.clear();
        self.depends_on.clear();
        self.dynamic_options.clear();
        self.rev_enabled_if.clear();
        self.rev_depends_on.clear();
        self.rev_dynamic_options.clear();

        for handle in registry.handles() {
            let id = handle.id().to_string();
            if let Some(dep) = &handle.spec.enabled_if {
                for cond in &dep.conditions {
                    push_edge(&mut self.rev_enabled_if, &cond.field_id, &id);
                }
                self.enabled_if.insert(id.clone(), dep.clone());
            }
            if let Some(dep) = &handle.spec.depends_on {
                for source in &dep.fields {
                    push_edge(&mut self.rev_depends_on, source, &id);
                }
                self.depends_on.insert(id.clone(), dep.clone());
            }
            if let Some(dep) = &handle.spec.dynamic_options {
                for arg in &dep.args {
                    push_edge(&mut self.rev_dynamic_options, &arg.field_id, &id);
                }
                self.dynamic_options.insert(id.clone(), dep.clone());
            }
        }
    }

    /// Validates the complete field set: every referenced field id must
    /// resolve within this group. Declared cycles are reported but not
    /// rejected; the single-flight guard keeps them safe at propagation
    /// time.
    pub fn analyze(&mut self, registry: &FieldRegistry) -> Result<(), Error> {
        self.rebuild(registry);

        for (dependent, dep) in &self.enabled_if {
            for cond in &dep.conditions {
                require_field(registry, dependent, &cond.field_id)?;
            }
        }
        for (dependent, dep) in &self.depends_on {
            for source in &dep.fields {
                require_field(registry, dependent, source)?;
            }
        }
        for (dependent, dep) in &self.dynamic_options {
            for arg in &dep.args {
                require_field(registry, dependent, &arg.field_id)?;
            }
        }

        if let Some(cycle_members) = self.find_cycle_members() {
            warn!(
                fields = %cycle_members.join(", "),
                "Declared field dependencies form a cycle; propagation will not recurse through it"
            );
        }

        Ok(())
    }

    fn find_cycle_members(&self) -> Option<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();
        let reverse_maps = [
            &self.rev_enabled_if,
            &self.rev_depends_on,
            &self.rev_dynamic_options,
        ];
        for map in reverse_maps {
            for (source, dependents) in map {
                let from = *nodes
                    .entry(source.as_str())
                    .or_insert_with(|| graph.add_node(source.as_str()));
                for dependent in dependents {
                    let to = *nodes
                        .entry(dependent.as_str())
                        .or_insert_with(|| graph.add_node(dependent.as_str()));
                    graph.add_edge(from, to, ());
                }
            }
        }
        if is_cyclic_directed(&graph) {
            Some(nodes.keys().map(|k| k.to_string()).collect())
        } else {
            None
        }
    }

    pub fn remove_field(&mut self, field_id: &str) {
        self.enabled_if.remove(field_id);
        self.depends_on.remove(field_id);
        self.dynamic_options.remove(field_id);
        for map in [
            &mut self.rev_enabled_if,
            &mut self.rev_depends_on,
            &mut self.rev_dynamic_options,
        ] {
            map.remove(field_id);
            for dependents in map.values_mut() {
                dependents.retain(|d| d != field_id);
            }
        }
    }

    /// Recomputes everything downstream of one changed field, in fixed
    /// order: dynamic options, then derived values, then enabled state,
    /// then deferred removals.
    pub fn on_field_changed(
        &mut self,
        registry: &mut FieldRegistry,
        providers: &ProviderRegistry,
        field_id: &str,
    ) {
        if self.propagating {
            debug!(field_id, "Propagation already in flight, skipping");
            return;
        }
        self.propagating = true;

        let source_value = registry.value_of(field_id).unwrap_or(ConfigValue::Null);
        let mut removals: Vec<String> = Vec::new();

        self.update_dynamic_options(registry, providers, field_id, &source_value, &mut removals);
        self.update_derived_values(registry, providers, field_id, &source_value);
        self.update_enabled_states(registry, field_id, &mut removals);

        for removed in removals {
            debug!(field_id = %removed, "Removing field during propagation");
            registry.remove(&removed);
            self.remove_field(&removed);
        }

        self.propagating = false;
    }

    fn update_dynamic_options(
        &mut self,
        registry: &mut FieldRegistry,
        providers: &ProviderRegistry,
        field_id: &str,
        source_value: &ConfigValue,
        removals: &mut Vec<String>,
    ) {
        let dependents = self
            .rev_dynamic_options
            .get(field_id)
            .cloned()
            .unwrap_or_default();
        for dependent in dependents {
            let Some(decl) = self.dynamic_options.get(&dependent).cloned() else {
                continue;
            };

            // Argument values are read fresh, substituting the value
            // just applied for the source field rather than whatever a
            // stale lookup might return.
            let mut args = ConfigMap::new();
            for arg in &decl.args {
                let value = if arg.field_id == field_id {
                    source_value.clone()
                } else {
                    registry.value_of(&arg.field_id).unwrap_or(ConfigValue::Null)
                };
                args.insert(arg.param_name.clone(), value);
            }

            let rows = match providers.fetch(&decl.provider, &args) {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(field_id = %dependent, provider = %decl.provider, "Options provider failed: {}", e);
                    continue;
                }
            };
            let options =
                rows_to_options(&rows, decl.value_key.as_deref(), decl.label_key.as_deref());

            let Some(handle) = registry.lookup_mut(&dependent) else {
                continue;
            };
            let Some(updater) = handle.widget_mut().options_updater() else {
                debug!(field_id = %dependent, "Field declares dynamic options but its widget has none");
                continue;
            };
            if !updater.replace_options(options) {
                removals.push(dependent);
            }
        }
    }

    fn update_derived_values(
        &mut self,
        registry: &mut FieldRegistry,
        providers: &ProviderRegistry,
        field_id: &str,
        source_value: &ConfigValue,
    ) {
        let dependents = self
            .rev_depends_on
            .get(field_id)
            .cloned()
            .unwrap_or_default();
        for dependent in dependents {
            let Some(decl) = self.depends_on.get(&dependent).cloned() else {
                continue;
            };

            let satisfied = decl.operator.combine(decl.fields.iter().map(|source| {
                match registry.value_of(source) {
                    Some(value) => !value.is_empty_like(),
                    None => {
                        debug!(field_id = %source, dependent = %dependent, "Referenced field not live, treating as unsatisfied");
                        false
                    }
                }
            }));

            if !satisfied {
                registry.set_enabled(&dependent, false);
                continue;
            }

            registry.set_enabled(&dependent, true);
            let derived = self.derive_value(registry, &dependent, source_value);
            if registry.set_value(&dependent, &derived) {
                // Mirrors the source field's own change notification;
                // the in-flight guard turns this nested call into a
                // no-op, so cyclic declarations terminate here.
                self.on_field_changed(registry, providers, &dependent);
            }
        }
    }

    /// Derived value: routed through the dependent's `values` lookup
    /// table when one is declared, else the source value passes through
    /// unchanged.
    fn derive_value(
        &self,
        registry: &FieldRegistry,
        dependent: &str,
        source_value: &ConfigValue,
    ) -> ConfigValue {
        let table = registry
            .lookup(dependent)
            .and_then(|h| h.spec.values.as_ref());
        match (table, source_value.scalar_string()) {
            (Some(table), Some(key)) => table.get(&key).cloned().unwrap_or_else(|| source_value.clone()),
            _ => source_value.clone(),
        }
    }

    fn update_enabled_states(
        &mut self,
        registry: &mut FieldRegistry,
        field_id: &str,
        removals: &mut Vec<String>,
    ) {
        let dependents = self
            .rev_enabled_if
            .get(field_id)
            .cloned()
            .unwrap_or_default();
        for dependent in dependents {
            let Some(decl) = self.enabled_if.get(&dependent) else {
                continue;
            };

            let enabled = decl.operator.combine(decl.conditions.iter().map(|cond| {
                match registry.value_of(&cond.field_id) {
                    Some(actual) => actual.loose_eq(&cond.required_value),
                    None => {
                        debug!(field_id = %cond.field_id, dependent = %dependent, "Referenced field not live, condition is false");
                        false
                    }
                }
            }));

            if !enabled && decl.remove_if_disabled {
                removals.push(dependent);
                continue;
            }
            registry.set_enabled(&dependent, enabled);
        }
    }
}

fn push_edge(map: &mut BTreeMap<String, Vec<String>>, source: &str, dependent: &str) {
    let dependents = map.entry(source.to_string()).or_default();
    if !dependents.iter().any(|d| d == dependent) {
        dependents.push(dependent.to_string());
    }
}

fn require_field(registry: &FieldRegistry, dependent: &str, referenced: &str) -> Result<(), Error> {
    if registry.contains(referenced) {
        Ok(())
    } else {
        Err(Error::Dependency(format!(
            "field '{dependent}' references '{referenced}', which is not part of this group"
        )))
    }
}

/// Evaluates an `enabled_if` declaration against current sibling
/// values, for a field's initial state before any change has occurred.
pub fn initial_enabled_state(registry: &FieldRegistry, decl: &EnabledIf) -> bool {
    decl.operator.combine(decl.conditions.iter().map(|cond| {
        registry
            .value_of(&cond.field_id)
            .map(|actual| actual.loose_eq(&cond.required_value))
            .unwrap_or(false)
    }))
}
