use std::collections::BTreeMap;

use tracing::warn;

use rigging_common::error::Error;
use rigging_common::resolved::SPECIAL_ATTR_KEYS;
use rigging_common::value::{ConfigMap, ConfigValue};

const CONDITION_OPERATORS: [&str; 8] = ["==", "!=", ">", "<", ">=", "<=", "in", "not in"];

/// Header of a sequence document.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceDoc {
    pub name: String,
    pub description: String,
    pub shortcut: Vec<String>,
}

/// Per-entry run condition, evaluated by the execution layer.
/// Validated here so a malformed condition fails the load instead of
/// surfacing mid-run. A condition without an `operator` key means
/// equality; everything else about the shape is mandatory.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryCondition {
    pub field: String,
    pub operator: String,
    pub value: ConfigValue,
}

/// One plugin entry of a sequence document after normalization. Legacy
/// `variables` keys have been folded into `config`; immutable once the
/// document is loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedSequenceEntry {
    pub plugin_name: String,
    pub config: ConfigMap,
    /// Index of this entry in the document's plugin list. Significant:
    /// positional matching pairs the N-th runtime instance of a plugin
    /// with the N-th entry of that plugin.
    pub position: usize,
    pub special_attrs: ConfigMap,
    pub conditions: Vec<EntryCondition>,
}

/// A sequence document's plugin list grouped by plugin name, preserving
/// document order within each group.
#[derive(Clone, Debug, Default)]
pub struct SequenceIndex {
    pub doc: Option<SequenceDoc>,
    entries: BTreeMap<String, Vec<NormalizedSequenceEntry>>,
}

impl SequenceIndex {
    /// Index with no sequence loaded. Resolution against it falls back
    /// to defaults and overrides only.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn normalize(doc: &ConfigValue) -> Result<Self, Error> {
        let map = doc
            .as_map()
            .ok_or_else(|| Error::Validation("sequence document must be a map".to_string()))?;

        let name = map
            .get("name")
            .and_then(ConfigValue::as_str)
            .ok_or_else(|| Error::Validation("sequence document needs a 'name'".to_string()))?
            .to_string();

        let plugins = map
            .get("plugins")
            .ok_or_else(|| Error::Validation("sequence document needs 'plugins'".to_string()))?
            .as_list()
            .ok_or_else(|| Error::Validation("sequence 'plugins' must be a list".to_string()))?;

        let description = map
            .get("description")
            .and_then(ConfigValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Sequence {}", name));

        let shortcut = match map.get("shortcut") {
            Some(ConfigValue::String(s)) => vec![s.clone()],
            Some(ConfigValue::List(list)) => list
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let mut entries: BTreeMap<String, Vec<NormalizedSequenceEntry>> = BTreeMap::new();
        for (position, raw) in plugins.iter().enumerate() {
            let entry = match raw {
                ConfigValue::String(plugin_name) => NormalizedSequenceEntry {
                    plugin_name: plugin_name.clone(),
                    config: ConfigMap::new(),
                    position,
                    special_attrs: ConfigMap::new(),
                    conditions: Vec::new(),
                },
                ConfigValue::Map(_) => normalize_map_entry(raw, position)?,
                other => {
                    warn!(
                        position,
                        "Skipping sequence entry of unsupported shape: {}", other
                    );
                    continue;
                }
            };
            entries
                .entry(entry.plugin_name.clone())
                .or_default()
                .push(entry);
        }

        Ok(SequenceIndex {
            doc: Some(SequenceDoc {
                name,
                description,
                shortcut,
            }),
            entries,
        })
    }

    pub fn entries_for(&self, plugin_name: &str) -> &[NormalizedSequenceEntry] {
        self.entries
            .get(plugin_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

fn normalize_map_entry(raw: &ConfigValue, position: usize) -> Result<NormalizedSequenceEntry, Error> {
    let plugin_name = raw
        .get("name")
        .and_then(ConfigValue::as_str)
        .ok_or_else(|| {
            Error::Validation(format!("sequence entry at position {position} has no 'name'"))
        })?
        .to_string();

    // 'config' is preferred; 'variables' is the legacy spelling and the
    // only accepted compatibility shim. Downstream code only ever sees
    // 'config'.
    let config = match raw.get("config").or_else(|| raw.get("variables")) {
        Some(ConfigValue::Map(m)) => m.clone(),
        Some(_) => {
            return Err(Error::Validation(format!(
                "sequence entry '{plugin_name}': config/variables must be a map"
            )));
        }
        None => ConfigMap::new(),
    };

    let mut special_attrs = ConfigMap::new();
    for key in SPECIAL_ATTR_KEYS {
        if let Some(value) = raw.get(key) {
            special_attrs.insert(key.to_string(), value.clone());
        }
    }

    let conditions = match raw.get("conditions") {
        None => Vec::new(),
        Some(ConfigValue::List(list)) => list
            .iter()
            .map(|cond| normalize_condition(cond, &plugin_name))
            .collect::<Result<_, _>>()?,
        Some(_) => {
            return Err(Error::Validation(format!(
                "sequence entry '{plugin_name}': 'conditions' must be a list"
            )));
        }
    };

    Ok(NormalizedSequenceEntry {
        plugin_name,
        config,
        position,
        special_attrs,
        conditions,
    })
}

fn normalize_condition(raw: &ConfigValue, plugin_name: &str) -> Result<EntryCondition, Error> {
    let field = raw
        .get("field")
        .and_then(ConfigValue::as_str)
        .ok_or_else(|| {
            Error::Validation(format!(
                "sequence entry '{plugin_name}': condition needs a 'field'"
            ))
        })?
        .to_string();

    let operator = raw
        .get("operator")
        .and_then(ConfigValue::as_str)
        .unwrap_or("==")
        .to_string();
    if !CONDITION_OPERATORS.contains(&operator.as_str()) {
        return Err(Error::Validation(format!(
            "sequence entry '{plugin_name}': unsupported condition operator '{operator}'"
        )));
    }

    let value = raw.get("value").cloned().ok_or_else(|| {
        Error::Validation(format!(
            "sequence entry '{plugin_name}': condition needs a 'value'"
        ))
    })?;

    Ok(EntryCondition {
        field,
        operator,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn index(yaml: &str) -> SequenceIndex {
        SequenceIndex::normalize(&parse_document(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_bare_and_map_entries_normalize() {
        let idx = index(
            "name: audit\nplugins:\n  - scan\n  - name: scan\n    config:\n      mode: deep\n  - name: report\n",
        );
        let scans = idx.entries_for("scan");
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].position, 0);
        assert!(scans[0].config.is_empty());
        assert_eq!(scans[1].position, 1);
        assert_eq!(scans[1].config.get("mode"), Some(&ConfigValue::from("deep")));
        assert_eq!(idx.entries_for("report").len(), 1);
    }

    #[test]
    fn test_legacy_variables_become_config() {
        let idx = index("name: audit\nplugins:\n  - name: scan\n    variables:\n      x: 1\n");
        assert_eq!(
            idx.entries_for("scan")[0].config.get("x"),
            Some(&ConfigValue::Int(1))
        );
    }

    #[test]
    fn test_special_attrs_are_lifted() {
        let idx = index(
            "name: audit\nplugins:\n  - name: scan\n    show_name: Deep scan\n    timeout: 30\n    config:\n      mode: deep\n",
        );
        let entry = &idx.entries_for("scan")[0];
        assert_eq!(
            entry.special_attrs.get("show_name"),
            Some(&ConfigValue::from("Deep scan"))
        );
        assert_eq!(entry.special_attrs.get("timeout"), Some(&ConfigValue::Int(30)));
        assert!(!entry.config.contains_key("show_name"));
    }

    #[test]
    fn test_unsupported_entry_shape_is_skipped() {
        let idx = index("name: audit\nplugins:\n  - scan\n  - 42\n");
        assert_eq!(idx.entry_count(), 1);
    }

    #[test]
    fn test_missing_name_fails_load() {
        let doc = parse_document("plugins: []").unwrap();
        assert!(SequenceIndex::normalize(&doc).is_err());
    }

    #[test]
    fn test_map_entry_without_name_fails_load() {
        let doc = parse_document("name: audit\nplugins:\n  - config:\n      x: 1\n").unwrap();
        assert!(SequenceIndex::normalize(&doc).is_err());
    }

    #[test]
    fn test_condition_operator_whitelist() {
        let ok = index(
            "name: audit\nplugins:\n  - name: scan\n    conditions:\n      - field: mode\n        operator: '!='\n        value: fast\n",
        );
        assert_eq!(ok.entries_for("scan")[0].conditions[0].operator, "!=");

        let doc = parse_document(
            "name: audit\nplugins:\n  - name: scan\n    conditions:\n      - field: mode\n        operator: '~='\n        value: fast\n",
        )
        .unwrap();
        assert!(SequenceIndex::normalize(&doc).is_err());
    }

    #[test]
    fn test_condition_without_operator_means_equality() {
        let idx = index(
            "name: audit\nplugins:\n  - name: scan\n    conditions:\n      - field: mode\n        value: deep\n",
        );
        assert_eq!(idx.entries_for("scan")[0].conditions[0].operator, "==");
    }

    #[test]
    fn test_description_defaults_and_shortcut_shapes() {
        let idx = index("name: audit\nplugins: []\nshortcut: ctrl+a\n");
        let doc = idx.doc.unwrap();
        assert_eq!(doc.description, "Sequence audit");
        assert_eq!(doc.shortcut, vec!["ctrl+a".to_string()]);
    }
}
