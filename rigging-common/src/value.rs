use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Ordered map used for every configuration payload.
/// Ordering is part of the contract: resolving the same inputs twice
/// must produce byte-identical output.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// Generic document tree produced by parsing configuration and sequence
/// files. All documents pass through this type before being projected
/// into typed structures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
    Map(ConfigMap),
}

impl ConfigValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Lenient boolean reading: sequence documents routinely carry
    /// `"true"`, `"yes"`, `"1"` or `"oui"` where a boolean is meant.
    pub fn as_bool_lenient(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::Int(0) => Some(false),
            ConfigValue::Int(1) => Some(true),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "oui" | "1" => Some(true),
                "false" | "no" | "non" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Canonical scalar rendering used for loose comparisons. Lists and
    /// maps have no scalar form.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Comparison used by dependency conditions: boolean-ish values are
    /// normalized first, then remaining scalars are compared through
    /// their string forms so that `1`, `"1"` and `1.0` all pair up.
    pub fn loose_eq(&self, other: &ConfigValue) -> bool {
        if self == other {
            return true;
        }
        if let (Some(a), Some(b)) = (self.as_bool_lenient(), other.as_bool_lenient()) {
            return a == b;
        }
        match (self.scalar_string(), other.scalar_string()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// True for the values dependency gating treats as "no value":
    /// null, the empty string, empty lists and empty maps.
    pub fn is_empty_like(&self) -> bool {
        match self {
            ConfigValue::Null => true,
            ConfigValue::String(s) => s.is_empty(),
            ConfigValue::List(l) => l.is_empty(),
            ConfigValue::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::Null => serde_json::Value::Null,
            ConfigValue::Bool(b) => serde_json::Value::Bool(*b),
            ConfigValue::Int(i) => serde_json::Value::from(*i),
            ConfigValue::Float(f) => serde_json::Value::from(*f),
            ConfigValue::String(s) => serde_json::Value::String(s.clone()),
            ConfigValue::List(l) => {
                serde_json::Value::Array(l.iter().map(ConfigValue::to_json).collect())
            }
            ConfigValue::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Projects this tree into a typed structure.
    pub fn parse_into<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scalar_string() {
            Some(s) => write!(f, "{}", s),
            None => match self {
                ConfigValue::Null => write!(f, "null"),
                ConfigValue::List(l) => write!(f, "[{} items]", l.len()),
                ConfigValue::Map(m) => write!(f, "{{{} keys}}", m.len()),
                _ => unreachable!(),
            },
        }
    }
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::Null
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(v: Vec<ConfigValue>) -> Self {
        ConfigValue::List(v)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(v: ConfigMap) -> Self {
        ConfigValue::Map(v)
    }
}

/// Overlays `overlay` onto `base`, overwriting colliding keys.
pub fn merge_over(base: &mut ConfigMap, overlay: &ConfigMap) {
    for (key, value) in overlay {
        base.insert(key.clone(), value.clone());
    }
}
