use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::ConfigMap;

/// Caller-assigned identifier for one runtime occurrence of a plugin.
/// Must be unique per plugin name within a run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceId {
    Int(i64),
    Str(String),
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceId::Int(i) => write!(f, "{}", i),
            InstanceId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for InstanceId {
    fn from(v: i64) -> Self {
        InstanceId::Int(v)
    }
}

impl From<&str> for InstanceId {
    fn from(v: &str) -> Self {
        InstanceId::Str(v.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(v: String) -> Self {
        InstanceId::Str(v)
    }
}

/// One runtime occurrence of a plugin, as handed over by the caller in
/// execution order.
#[derive(Clone, Debug, PartialEq)]
pub struct PluginInstanceRef {
    pub plugin_name: String,
    pub instance_id: InstanceId,
    /// Explicit per-instance configuration. Highest merge priority, and
    /// also drives best-match pairing against sequence entries.
    pub override_config: Option<ConfigMap>,
}

impl PluginInstanceRef {
    pub fn new(plugin_name: impl Into<String>, instance_id: impl Into<InstanceId>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            instance_id: instance_id.into(),
            override_config: None,
        }
    }

    pub fn with_override(mut self, config: ConfigMap) -> Self {
        self.override_config = Some(config);
        self
    }

    /// Canonical key identifying this instance across the engine.
    pub fn instance_key(&self) -> String {
        instance_key(&self.plugin_name, &self.instance_id)
    }

    /// Sequence markers and other pseudo-entries use a `__` name prefix
    /// and are never resolved into a plugin configuration.
    pub fn is_pseudo(&self) -> bool {
        self.plugin_name.starts_with("__")
    }
}

pub fn instance_key(plugin_name: &str, instance_id: &InstanceId) -> String {
    format!("{}_{}", plugin_name, instance_id)
}
