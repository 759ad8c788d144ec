use rigging_common::field::FieldSpec;
use rigging_common::value::{ConfigMap, ConfigValue};
use rigging_engine::fields::FieldEvent;
use rigging_engine::group::ConfigGroup;
use rigging_engine::providers::ProviderRegistry;
use tokio::sync::mpsc;

fn spec(yaml: &str) -> FieldSpec {
    init_tracing();
    serde_yaml::from_str(yaml).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn checkbox(id: &str, default: bool) -> FieldSpec {
    spec(&format!("id: {id}\ntype: checkbox\ndefault: {default}"))
}

#[test]
fn enabled_if_snapshot_and_restore() {
    let providers = ProviderRegistry::new();
    let mut group = ConfigGroup::new();
    group.add_field(checkbox("a", true), &providers);
    group.add_field(
        spec("id: b\ndefault: kept\nenabled_if:\n  field: a\n  value: true"),
        &providers,
    );
    group.analyze().unwrap();

    group.set_field_value(&providers, "b", &ConfigValue::from("edited"));

    group.set_field_value(&providers, "a", &ConfigValue::Bool(false));
    assert!(!group.is_enabled("b"));
    assert_eq!(group.field_value("b"), None);

    group.set_field_value(&providers, "a", &ConfigValue::Bool(true));
    assert!(group.is_enabled("b"));
    assert_eq!(group.field_value("b"), Some(ConfigValue::from("edited")));
}

#[test]
fn or_operator_truth_table() {
    let cases = [
        (false, false, false),
        (true, false, true),
        (false, true, true),
        (true, true, true),
    ];
    for (a, b, expect_enabled) in cases {
        let providers = ProviderRegistry::new();
        let mut group = ConfigGroup::new();
        group.add_field(checkbox("a", false), &providers);
        group.add_field(checkbox("b", false), &providers);
        group.add_field(
            spec(
                "id: c\nenabled_if:\n  conditions:\n    - field: a\n      value: true\n    - field: b\n      value: true\n  operator: OR",
            ),
            &providers,
        );
        group.analyze().unwrap();

        group.set_field_value(&providers, "a", &ConfigValue::Bool(a));
        group.set_field_value(&providers, "b", &ConfigValue::Bool(b));
        assert_eq!(
            group.is_enabled("c"),
            expect_enabled,
            "a={a} b={b}"
        );
    }
}

#[test]
fn boolean_ish_strings_satisfy_conditions() {
    let providers = ProviderRegistry::new();
    let mut group = ConfigGroup::new();
    group.add_field(spec("id: a"), &providers);
    group.add_field(
        spec("id: b\nenabled_if:\n  field: a\n  value: true"),
        &providers,
    );
    group.analyze().unwrap();

    for (written, expect) in [("oui", true), ("YES", true), ("non", false), ("0", false)] {
        group.set_field_value(&providers, "a", &ConfigValue::from(written));
        assert_eq!(group.is_enabled("b"), expect, "written={written}");
    }
}

#[test]
fn transitive_self_reference_terminates() {
    let providers = ProviderRegistry::new();
    let mut group = ConfigGroup::new();
    group.add_field(spec("id: x\ndepends_on: y"), &providers);
    group.add_field(spec("id: y\ndepends_on: x"), &providers);
    group.analyze().unwrap();

    group.set_field_value(&providers, "x", &ConfigValue::from("seed"));
    // One hop is propagated; the cycle back into x is cut by the
    // in-flight guard.
    assert_eq!(group.field_value("y"), Some(ConfigValue::from("seed")));
    assert_eq!(group.field_value("x"), Some(ConfigValue::from("seed")));
}

#[test]
fn derived_value_chain_with_lookup_table() {
    let providers = ProviderRegistry::new();
    let mut group = ConfigGroup::new();
    group.add_field(spec("id: mode"), &providers);
    group.add_field(
        spec("id: depth\ndepends_on: mode\nvalues:\n  fast: 1\n  deep: 9"),
        &providers,
    );
    group.analyze().unwrap();

    group.set_field_value(&providers, "mode", &ConfigValue::from("fast"));
    assert_eq!(group.field_value("depth"), Some(ConfigValue::from("1")));

    group.set_field_value(&providers, "mode", &ConfigValue::from("deep"));
    assert_eq!(group.field_value("depth"), Some(ConfigValue::from("9")));
}

#[test]
fn dynamic_options_follow_their_source() {
    let mut providers = ProviderRegistry::new();
    providers.register("list_partitions", |args: &ConfigMap| {
        let device = args
            .get("device")
            .and_then(ConfigValue::as_str)
            .unwrap_or_default()
            .to_string();
        if device.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![
            ConfigValue::from(format!("{device}1")),
            ConfigValue::from(format!("{device}2")),
        ])
    });

    let mut group = ConfigGroup::new();
    group.add_field(spec("id: disk"), &providers);
    group.add_field(
        spec(
            "id: partition\ntype: select\ndynamic_options:\n  provider: list_partitions\n  args:\n    - field: disk\n      param_name: device",
        ),
        &providers,
    );
    group.analyze().unwrap();

    group.set_field_value(&providers, "disk", &ConfigValue::from("sda"));
    assert_eq!(group.field_value("partition"), Some(ConfigValue::from("sda1")));

    group.set_field_value(&providers, "disk", &ConfigValue::from("nvme0n1"));
    assert_eq!(
        group.field_value("partition"),
        Some(ConfigValue::from("nvme0n11"))
    );
}

#[test]
fn events_reach_the_widget_layer() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let providers = ProviderRegistry::new();
    let mut group = ConfigGroup::with_events(tx);
    group.add_field(checkbox("a", true), &providers);
    group.add_field(
        spec("id: b\nenabled_if:\n  field: a\n  value: true"),
        &providers,
    );
    group.analyze().unwrap();

    group.set_field_value(&providers, "a", &ConfigValue::Bool(false));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.contains(&FieldEvent::ValueChanged {
        field_id: "a".to_string(),
        value: ConfigValue::Bool(false),
    }));
    assert!(events.contains(&FieldEvent::EnabledChanged {
        field_id: "b".to_string(),
        enabled: false,
    }));
}

#[tokio::test(start_paused = true)]
async fn template_values_apply_through_retries() {
    let providers = ProviderRegistry::new();
    let mut group = ConfigGroup::new();
    group.add_field(spec("id: mode\nvariable: scan_mode"), &providers);

    // A select with no options yet cannot take the template value; it
    // stays pending until the options exist.
    group.add_field(spec("id: level\ntype: select"), &providers);

    let template: ConfigMap =
        serde_yaml::from_str("scan_mode: deep\nlevel: high\nmissing_field: x").unwrap();
    group.apply_values(&template);

    assert_eq!(group.field_value("mode"), Some(ConfigValue::from("deep")));
    assert_eq!(group.pending_count(), 2);

    group.drain_pending().await;
    // Neither the optionless select nor the unknown field ever took a
    // value, and the caller never saw an error.
    assert_eq!(group.pending_count(), 0);
    assert_eq!(group.field_value("level"), Some(ConfigValue::Null));
    assert!(!group.contains("missing_field"));
}

#[test]
fn remove_if_disabled_deletes_the_field() {
    let providers = ProviderRegistry::new();
    let mut group = ConfigGroup::new();
    group.add_field(checkbox("advanced", true), &providers);
    group.add_field(
        spec(
            "id: danger_zone\nenabled_if:\n  field: advanced\n  value: true\n  remove_if_disabled: true",
        ),
        &providers,
    );
    group.analyze().unwrap();

    group.set_field_value(&providers, "advanced", &ConfigValue::Bool(false));
    assert!(!group.contains("danger_zone"));
}
