use serde::Serialize;

use crate::instance::InstanceId;
use crate::value::{ConfigMap, ConfigValue};

/// Keys lifted out of merged configuration into display and execution
/// attributes rather than plugin parameters.
pub const SPECIAL_ATTR_KEYS: [&str; 6] = [
    "show_name",
    "icon",
    "remote_execution",
    "template",
    "ignore_errors",
    "timeout",
];

/// Final configuration for one plugin instance after every source has
/// been merged.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedPluginConfig {
    pub plugin_name: String,
    pub instance_id: InstanceId,
    pub display_name: String,
    pub icon: Option<String>,
    /// Plugin parameters, special attributes already lifted out.
    pub config: ConfigMap,
    /// The lifted display/execution attributes.
    pub special_attrs: ConfigMap,
    /// True only when the plugin supports remote execution and the
    /// merged configuration asks for it.
    pub remote_execution: bool,
}

impl ResolvedPluginConfig {
    pub fn instance_key(&self) -> String {
        crate::instance::instance_key(&self.plugin_name, &self.instance_id)
    }

    pub fn special_attr(&self, key: &str) -> Option<&ConfigValue> {
        self.special_attrs.get(key)
    }

    pub fn ignore_errors(&self) -> bool {
        self.special_attr("ignore_errors")
            .and_then(ConfigValue::as_bool_lenient)
            .unwrap_or(false)
    }

    pub fn timeout_secs(&self) -> Option<i64> {
        match self.special_attr("timeout") {
            Some(ConfigValue::Int(n)) => Some(*n),
            Some(ConfigValue::String(s)) => s.parse().ok(),
            _ => None,
        }
    }
}
