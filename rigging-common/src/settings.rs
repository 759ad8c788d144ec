use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::error::Error;
use crate::field::FieldSpec;
use crate::value::ConfigValue;

/// A plugin's settings document: identity, display attributes and the
/// declared configuration fields.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PluginSettings {
    #[serde(default)]
    pub name: String,
    /// Display name shown to operators; falls back to `name`.
    #[serde(default, alias = "plugin_name")]
    pub show_name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the plugin is able to run on a remote host at all. The
    /// resolved flag additionally requires the caller to ask for it.
    #[serde(default)]
    pub remote_execution: bool,
    #[serde(default, deserialize_with = "deserialize_fields")]
    pub config_fields: Vec<FieldSpec>,
}

impl PluginSettings {
    pub fn parse(raw: &ConfigValue) -> Result<Self, Error> {
        raw.parse_into()
    }

    pub fn display_name(&self) -> &str {
        self.show_name.as_deref().unwrap_or(&self.name)
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.config_fields.iter().find(|f| f.id == id)
    }
}

/// `config_fields` comes in two shapes: a list of field declarations
/// each carrying its own `id`, or a map keyed by field id. Map keys
/// fill in missing ids.
fn deserialize_fields<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<FieldSpec>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FieldsShape {
        List(Vec<FieldSpec>),
        Map(BTreeMap<String, FieldSpec>),
    }

    match FieldsShape::deserialize(deserializer)? {
        FieldsShape::List(fields) => Ok(fields),
        FieldsShape::Map(map) => Ok(map
            .into_iter()
            .map(|(key, mut spec)| {
                if spec.id.is_empty() {
                    spec.id = key;
                }
                spec
            })
            .collect()),
    }
}
