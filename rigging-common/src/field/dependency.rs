use serde::{Deserialize, Deserializer};
use strum_macros::{Display, EnumString};
use tracing::warn;

use crate::value::ConfigValue;

/// Combinator applied over a dependency's conditions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    /// Unknown operator strings fall back to AND rather than failing
    /// the whole document.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            warn!("Unknown logical operator '{}', defaulting to AND", raw);
            LogicalOperator::And
        })
    }

    pub fn combine(&self, results: impl IntoIterator<Item = bool>) -> bool {
        match self {
            LogicalOperator::And => results.into_iter().all(|r| r),
            LogicalOperator::Or => results.into_iter().any(|r| r),
        }
    }
}

fn operator_of(map: &ConfigValue) -> LogicalOperator {
    match map.get("operator").and_then(ConfigValue::as_str) {
        Some(raw) => LogicalOperator::parse_lenient(raw),
        None => LogicalOperator::And,
    }
}

/// One `field == value` check inside an `EnabledIf` declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub field_id: String,
    pub required_value: ConfigValue,
}

impl Condition {
    fn from_value(value: &ConfigValue) -> Option<Self> {
        let field_id = value
            .get("field")
            .or_else(|| value.get("field_id"))
            .and_then(ConfigValue::as_str)?
            .to_string();
        let required_value = value
            .get("value")
            .or_else(|| value.get("required_value"))
            .cloned()
            .unwrap_or(ConfigValue::Null);
        Some(Condition {
            field_id,
            required_value,
        })
    }
}

/// Conditional enablement: the field is live only while the combined
/// conditions hold. Declarations come in a legacy single-condition
/// shape, an explicit multi-condition shape, an implicit
/// `field_id: value` map shape and a bare condition list; all of them
/// normalize into this one representation.
#[derive(Clone, Debug, PartialEq)]
pub struct EnabledIf {
    pub conditions: Vec<Condition>,
    pub operator: LogicalOperator,
    pub remove_if_disabled: bool,
}

const ENABLED_IF_META_KEYS: [&str; 2] = ["operator", "remove_if_disabled"];

impl EnabledIf {
    pub fn from_value(raw: &ConfigValue) -> Result<Self, String> {
        match raw {
            ConfigValue::Map(map) => {
                let remove_if_disabled = raw
                    .get("remove_if_disabled")
                    .and_then(ConfigValue::as_bool_lenient)
                    .unwrap_or(false);

                let conditions = if map.contains_key("field") && map.contains_key("value") {
                    vec![
                        Condition::from_value(raw)
                            .ok_or("enabled_if 'field' must be a string")?,
                    ]
                } else if let Some(list) = raw.get("conditions").and_then(ConfigValue::as_list) {
                    list.iter().filter_map(Condition::from_value).collect()
                } else {
                    map.iter()
                        .filter(|(key, _)| !ENABLED_IF_META_KEYS.contains(&key.as_str()))
                        .map(|(key, value)| Condition {
                            field_id: key.clone(),
                            required_value: value.clone(),
                        })
                        .collect()
                };

                if conditions.is_empty() {
                    return Err("enabled_if declares no conditions".to_string());
                }

                Ok(EnabledIf {
                    conditions,
                    operator: operator_of(raw),
                    remove_if_disabled,
                })
            }
            ConfigValue::List(list) => {
                let conditions: Vec<Condition> =
                    list.iter().filter_map(Condition::from_value).collect();
                if conditions.is_empty() {
                    return Err("enabled_if list declares no valid conditions".to_string());
                }
                Ok(EnabledIf {
                    conditions,
                    operator: LogicalOperator::And,
                    remove_if_disabled: false,
                })
            }
            _ => Err("enabled_if must be a map or a list of conditions".to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for EnabledIf {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = ConfigValue::deserialize(deserializer)?;
        EnabledIf::from_value(&raw).map_err(serde::de::Error::custom)
    }
}

/// Derived value: this field's value is recomputed from other fields.
/// Legacy shapes (bare string, list of strings) normalize into the
/// fields-plus-operator form.
#[derive(Clone, Debug, PartialEq)]
pub struct DependsOn {
    pub fields: Vec<String>,
    pub operator: LogicalOperator,
}

impl DependsOn {
    pub fn from_value(raw: &ConfigValue) -> Result<Self, String> {
        match raw {
            ConfigValue::String(field) => Ok(DependsOn {
                fields: vec![field.clone()],
                operator: LogicalOperator::And,
            }),
            ConfigValue::List(list) => Ok(DependsOn {
                fields: list
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                operator: LogicalOperator::And,
            }),
            ConfigValue::Map(map) => {
                let fields = match raw.get("fields") {
                    Some(ConfigValue::String(field)) => vec![field.clone()],
                    Some(ConfigValue::List(list)) => list
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                    Some(_) => return Err("depends_on 'fields' must be a string or list".into()),
                    // Implicit shape: every truthy key that is not
                    // 'operator' names a field.
                    None => map
                        .iter()
                        .filter(|(key, value)| {
                            key.as_str() != "operator"
                                && value.as_bool_lenient().unwrap_or(true)
                        })
                        .map(|(key, _)| key.clone())
                        .collect(),
                };
                if fields.is_empty() {
                    return Err("depends_on declares no fields".to_string());
                }
                Ok(DependsOn {
                    fields,
                    operator: operator_of(raw),
                })
            }
            _ => Err("depends_on must be a string, list or map".to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for DependsOn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = ConfigValue::deserialize(deserializer)?;
        DependsOn::from_value(&raw).map_err(serde::de::Error::custom)
    }
}

/// Binds the value of another field to a named provider parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderArg {
    pub field_id: String,
    pub param_name: String,
}

fn args_of(raw: &ConfigValue) -> Vec<ProviderArg> {
    let Some(list) = raw.get("args").and_then(ConfigValue::as_list) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|arg| {
            let field_id = arg
                .get("field")
                .or_else(|| arg.get("field_id"))
                .and_then(ConfigValue::as_str)?
                .to_string();
            let param_name = arg
                .get("param_name")
                .and_then(ConfigValue::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| field_id.clone());
            Some(ProviderArg {
                field_id,
                param_name,
            })
        })
        .collect()
}

fn provider_of(raw: &ConfigValue) -> Result<String, String> {
    raw.get("provider")
        .or_else(|| raw.get("function"))
        .or_else(|| raw.get("script"))
        .and_then(ConfigValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| "dynamic declaration names no provider".to_string())
}

/// The field's option list is recomputed by a registered provider
/// whenever one of the argument fields changes.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicOptions {
    pub provider: String,
    pub args: Vec<ProviderArg>,
    /// Key extracted from map-shaped provider rows as the option value.
    pub value_key: Option<String>,
    /// Key extracted from map-shaped provider rows as the option label.
    pub label_key: Option<String>,
}

impl DynamicOptions {
    pub fn from_value(raw: &ConfigValue) -> Result<Self, String> {
        if raw.as_map().is_none() {
            return Err("dynamic_options must be a map".to_string());
        }
        Ok(DynamicOptions {
            provider: provider_of(raw)?,
            args: args_of(raw),
            value_key: raw
                .get("value")
                .and_then(ConfigValue::as_str)
                .map(str::to_string),
            label_key: raw
                .get("description")
                .and_then(ConfigValue::as_str)
                .map(str::to_string),
        })
    }
}

impl<'de> Deserialize<'de> for DynamicOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = ConfigValue::deserialize(deserializer)?;
        DynamicOptions::from_value(&raw).map_err(serde::de::Error::custom)
    }
}

/// Computed initial value, resolved through the same provider registry
/// as dynamic options.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicDefault {
    pub provider: String,
    pub args: Vec<ProviderArg>,
    pub value_key: Option<String>,
}

impl DynamicDefault {
    pub fn from_value(raw: &ConfigValue) -> Result<Self, String> {
        if raw.as_map().is_none() {
            return Err("dynamic_default must be a map".to_string());
        }
        Ok(DynamicDefault {
            provider: provider_of(raw)?,
            args: args_of(raw),
            value_key: raw
                .get("value")
                .and_then(ConfigValue::as_str)
                .map(str::to_string),
        })
    }
}

impl<'de> Deserialize<'de> for DynamicDefault {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = ConfigValue::deserialize(deserializer)?;
        DynamicDefault::from_value(&raw).map_err(serde::de::Error::custom)
    }
}
