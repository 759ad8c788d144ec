use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumString};

use crate::field::{DependsOn, DynamicDefault, DynamicOptions, EnabledIf};
use crate::value::{ConfigMap, ConfigValue};

/// Input widget kind a field renders as.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FieldKind {
    #[default]
    Text,
    Directory,
    Ip,
    Password,
    Checkbox,
    Select,
    CheckboxGroup,
}

impl FieldKind {
    /// Whether values of this kind are booleans.
    pub fn is_boolean(&self) -> bool {
        matches!(self, FieldKind::Checkbox)
    }
}

/// One selectable choice of a select or checkbox-group field.
/// Declared either as a bare scalar or as a map carrying a separate
/// display label.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectOption {
    pub label: String,
    pub value: ConfigValue,
}

impl SelectOption {
    pub fn from_value(raw: &ConfigValue) -> Option<Self> {
        match raw {
            ConfigValue::Map(_) => {
                let value = raw.get("value").cloned()?;
                let label = raw
                    .get("label")
                    .or_else(|| raw.get("name"))
                    .and_then(ConfigValue::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                Some(SelectOption { label, value })
            }
            ConfigValue::Null | ConfigValue::List(_) => None,
            scalar => Some(SelectOption {
                label: scalar.to_string(),
                value: scalar.clone(),
            }),
        }
    }

    pub fn scalar(value: impl Into<ConfigValue>) -> Self {
        let value = value.into();
        SelectOption {
            label: value.to_string(),
            value,
        }
    }
}

impl<'de> Deserialize<'de> for SelectOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = ConfigValue::deserialize(deserializer)?;
        SelectOption::from_value(&raw)
            .ok_or_else(|| serde::de::Error::custom("invalid option declaration"))
    }
}

/// Declaration of one configuration field, as written in a plugin's
/// settings document.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FieldSpec {
    /// Filled from the map key when fields are declared map-shaped.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub default: Option<ConfigValue>,
    #[serde(default)]
    pub required: bool,
    /// Config key this field writes to; defaults to the field id.
    #[serde(default)]
    pub variable: Option<String>,
    /// Per-choice extra config merged in when the choice is selected.
    #[serde(default)]
    pub values: Option<ConfigMap>,
    #[serde(default)]
    pub options: Option<Vec<SelectOption>>,
    #[serde(default)]
    pub enabled_if: Option<EnabledIf>,
    #[serde(default)]
    pub depends_on: Option<DependsOn>,
    #[serde(default)]
    pub dynamic_options: Option<DynamicOptions>,
    #[serde(default)]
    pub dynamic_default: Option<DynamicDefault>,
}

impl FieldSpec {
    /// Config key this field's value is stored under.
    pub fn variable_name(&self) -> &str {
        self.variable.as_deref().unwrap_or(&self.id)
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_spec_defaults() {
        let spec: FieldSpec = serde_yaml::from_str("id: target_dir").unwrap();
        assert_eq!(spec.kind, FieldKind::Text);
        assert!(!spec.required);
        assert_eq!(spec.variable_name(), "target_dir");
    }

    #[test]
    fn test_field_spec_full_shape() {
        let spec: FieldSpec = serde_yaml::from_str(
            "id: mode\ntype: select\nlabel: Scan mode\nvariable: scan_mode\noptions:\n  - fast\n  - label: Deep scan\n    value: deep\n",
        )
        .unwrap();
        assert_eq!(spec.kind, FieldKind::Select);
        assert_eq!(spec.variable_name(), "scan_mode");
        let options = spec.options.unwrap();
        assert_eq!(options[0].label, "fast");
        assert_eq!(options[0].value, ConfigValue::from("fast"));
        assert_eq!(options[1].label, "Deep scan");
        assert_eq!(options[1].value, ConfigValue::from("deep"));
    }

    #[test]
    fn test_unknown_kind_is_rejected_by_serde() {
        let res: Result<FieldSpec, _> = serde_yaml::from_str("id: x\ntype: slider");
        assert!(res.is_err());
    }
}
