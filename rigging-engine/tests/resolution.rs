use std::collections::BTreeMap;

use rigging_common::instance::PluginInstanceRef;
use rigging_common::settings::PluginSettings;
use rigging_common::value::{ConfigMap, ConfigValue};
use rigging_engine::resolver::ConfigResolver;
use rigging_registry::parser::parse_document;
use rigging_registry::sequence::SequenceIndex;
use rigging_registry::settings_store::SettingsStore;

fn index(yaml: &str) -> SequenceIndex {
    SequenceIndex::normalize(&parse_document(yaml).unwrap()).unwrap()
}

fn settings(yaml: &str) -> SettingsStore {
    let mut store = SettingsStore::new();
    store.insert(serde_yaml::from_str::<PluginSettings>(yaml).unwrap());
    store
}

fn config_map(yaml: &str) -> ConfigMap {
    serde_yaml::from_str(yaml).unwrap()
}

const SCAN_SETTINGS: &str = "\
name: scan
config_fields:
  - id: a
    default: 1
  - id: b
    default: 2
";

#[test]
fn priority_ordering_across_all_three_tiers() {
    let index = index(
        "name: seq\nplugins:\n  - name: scan\n    config:\n      b: 3\n      c: 4\n",
    );
    let store = settings(SCAN_SETTINGS);
    let resolver = ConfigResolver::new(&index, &store);

    let instances =
        vec![PluginInstanceRef::new("scan", 0).with_override(config_map("c: 5"))];
    let resolved = resolver.resolve(&instances);
    let record = &resolved["scan_0"];

    assert_eq!(record.config.get("a"), Some(&ConfigValue::Int(1)));
    assert_eq!(record.config.get("b"), Some(&ConfigValue::Int(3)));
    assert_eq!(record.config.get("c"), Some(&ConfigValue::Int(5)));
}

#[test]
fn resolution_is_idempotent() {
    let index = index(
        "name: seq\nplugins:\n  - name: scan\n    config:\n      mode: fast\n  - name: scan\n    config:\n      mode: deep\n",
    );
    let store = settings(SCAN_SETTINGS);
    let resolver = ConfigResolver::new(&index, &store);

    let instances = vec![
        PluginInstanceRef::new("scan", 0),
        PluginInstanceRef::new("scan", 1).with_override(config_map("mode: deep")),
    ];

    let first = resolver.resolve(&instances);
    let second = resolver.resolve(&instances);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn positional_fallback_pairs_instances_in_order() {
    let index = index(
        "name: seq\nplugins:\n  - name: scan\n    config:\n      mode: fast\n  - name: scan\n    config:\n      mode: deep\n",
    );
    let store = settings("name: scan");
    let resolver = ConfigResolver::new(&index, &store);

    let resolved = resolver.resolve(&[
        PluginInstanceRef::new("scan", 0),
        PluginInstanceRef::new("scan", 1),
    ]);

    assert_eq!(
        resolved["scan_0"].config.get("mode"),
        Some(&ConfigValue::from("fast"))
    );
    assert_eq!(
        resolved["scan_1"].config.get("mode"),
        Some(&ConfigValue::from("deep"))
    );
}

#[test]
fn best_match_binds_each_entry_at_most_once() {
    let index = index(
        "name: seq\nplugins:\n  - name: scan\n    config:\n      mode: fast\n      tag: first\n  - name: scan\n    config:\n      mode: deep\n      tag: second\n",
    );
    let store = settings("name: scan");
    let resolver = ConfigResolver::new(&index, &store);

    let deep = config_map("mode: deep");
    let resolved = resolver.resolve(&[
        PluginInstanceRef::new("scan", 0).with_override(deep.clone()),
        PluginInstanceRef::new("scan", 1).with_override(deep),
    ]);

    // Both carry the override, but only one is backed by the sequence's
    // deep entry; the other binds nothing, its positional slot being
    // consumed already.
    assert_eq!(
        resolved["scan_0"].config.get("tag"),
        Some(&ConfigValue::from("second"))
    );
    assert_eq!(resolved["scan_1"].config.get("tag"), None);
}

#[test]
fn legacy_variables_resolve_like_config() {
    let store = settings("name: scan");

    let with_config = index("name: seq\nplugins:\n  - name: scan\n    config:\n      x: 1\n");
    let with_variables =
        index("name: seq\nplugins:\n  - name: scan\n    variables:\n      x: 1\n");

    let instances = vec![PluginInstanceRef::new("scan", 0)];
    let a = ConfigResolver::new(&with_config, &store).resolve(&instances);
    let b = ConfigResolver::new(&with_variables, &store).resolve(&instances);

    assert_eq!(a["scan_0"].config, b["scan_0"].config);
}

#[test]
fn pseudo_entries_are_never_resolved() {
    let index = index("name: seq\nplugins: []\n");
    let store = settings("name: scan");
    let resolver = ConfigResolver::new(&index, &store);

    let resolved = resolver.resolve(&[
        PluginInstanceRef::new("__marker__", 0),
        PluginInstanceRef::new("scan", 0),
    ]);
    assert_eq!(resolved.len(), 1);
    assert!(resolved.contains_key("scan_0"));
}

#[test]
fn remote_execution_needs_support_and_request() {
    let index = index(
        "name: seq\nplugins:\n  - name: scan\n    remote_execution: true\n  - name: report\n    remote_execution: true\n",
    );
    let mut store = settings("name: scan\nremote_execution: true");
    store.insert(serde_yaml::from_str::<PluginSettings>("name: report").unwrap());
    let resolver = ConfigResolver::new(&index, &store);

    let resolved = resolver.resolve(&[
        PluginInstanceRef::new("scan", 0),
        PluginInstanceRef::new("report", 0),
    ]);

    assert!(resolved["scan_0"].remote_execution);
    // The sequence asks, but the plugin declares no remote support.
    assert!(!resolved["report_0"].remote_execution);
}

#[test]
fn special_attrs_are_lifted_out_of_config() {
    let index = index(
        "name: seq\nplugins:\n  - name: scan\n    show_name: Deep scan\n    config:\n      mode: deep\n",
    );
    let store = settings("name: scan");
    let resolver = ConfigResolver::new(&index, &store);

    let instances = vec![PluginInstanceRef::new("scan", 0)
        .with_override(config_map("timeout: 30"))];
    let resolved = resolver.resolve(&instances);
    let record = &resolved["scan_0"];

    assert_eq!(record.display_name, "Deep scan");
    assert!(!record.config.contains_key("timeout"));
    assert_eq!(record.timeout_secs(), Some(30));
    assert_eq!(record.config.get("mode"), Some(&ConfigValue::from("deep")));
}

#[test]
fn prior_config_sits_below_sequence_and_override() {
    let index = index("name: seq\nplugins:\n  - name: scan\n    config:\n      b: 20\n");
    let store = settings("name: scan");

    let prior_pass = {
        let empty = SequenceIndex::empty();
        let resolver = ConfigResolver::new(&empty, &store);
        resolver.resolve(&[PluginInstanceRef::new("scan", 0)
            .with_override(config_map("a: 10\nb: 10"))])
    };

    let resolver = ConfigResolver::new(&index, &store).with_prior(prior_pass);
    let resolved = resolver.resolve(&[PluginInstanceRef::new("scan", 0)]);
    let record = &resolved["scan_0"];

    // Prior pass contributed a=10; the sequence overrides b.
    assert_eq!(record.config.get("a"), Some(&ConfigValue::Int(10)));
    assert_eq!(record.config.get("b"), Some(&ConfigValue::Int(20)));
}

#[test]
fn resolver_never_fails_without_sequence_or_settings() {
    let index = SequenceIndex::empty();
    let store = SettingsStore::new();
    let resolver = ConfigResolver::new(&index, &store);

    let resolved = resolver.resolve(&[PluginInstanceRef::new("unknown", 7)]);
    let record = &resolved["unknown_7"];
    assert!(record.config.is_empty());
    assert_eq!(record.display_name, "unknown");
    assert!(!record.remote_execution);
}

#[test]
fn occurrence_past_sequence_length_still_resolves() {
    let index = index("name: seq\nplugins:\n  - name: scan\n    config:\n      mode: fast\n");
    let store = settings(SCAN_SETTINGS);
    let resolver = ConfigResolver::new(&index, &store);

    let resolved = resolver.resolve(&[
        PluginInstanceRef::new("scan", 0),
        PluginInstanceRef::new("scan", 1),
    ]);
    assert_eq!(
        resolved["scan_1"].config.get("a"),
        Some(&ConfigValue::Int(1))
    );
    assert!(!resolved["scan_1"].config.contains_key("mode"));
}

#[test]
fn output_is_a_plain_value_map() {
    let index = index("name: seq\nplugins:\n  - scan\n");
    let store = settings("name: scan");
    let resolver = ConfigResolver::new(&index, &store);

    let resolved: BTreeMap<_, _> = resolver.resolve(&[PluginInstanceRef::new("scan", 0)]);
    // Handed off by value; mutating the copy cannot affect a later pass.
    let mut copy = resolved.clone();
    copy.get_mut("scan_0")
        .unwrap()
        .config
        .insert("injected".to_string(), ConfigValue::Bool(true));

    let again = resolver.resolve(&[PluginInstanceRef::new("scan", 0)]);
    assert!(!again["scan_0"].config.contains_key("injected"));
}
