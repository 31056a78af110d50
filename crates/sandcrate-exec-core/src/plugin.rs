//! Plugin identity and execution command types.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DEFAULT_TIMEOUT_MS;
use crate::{Error, Result};

/// Identity of an installed plugin, as listed by the plugin registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PluginRef {
    /// Registry identifier, sent as `plugin_id`
    pub id: String,
    /// Human-readable name
    pub name: String,
}

impl PluginRef {
    /// Create a new plugin reference.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for PluginRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A single request to execute a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionCommand {
    /// Plugin to execute
    pub plugin_id: String,
    /// JSON parameters handed to the plugin (empty object if none)
    pub parameters: Value,
    /// Advisory bound on how long the run may stay starting/running
    pub timeout_ms: u64,
}

impl ExecutionCommand {
    /// Create a command with the default timeout.
    pub fn new(plugin: &PluginRef, parameters: Value) -> Self {
        Self::with_timeout(plugin, parameters, DEFAULT_TIMEOUT_MS)
    }

    /// Create a command with an explicit timeout.
    pub fn with_timeout(plugin: &PluginRef, parameters: Value, timeout_ms: u64) -> Self {
        let parameters = match parameters {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Self {
            plugin_id: plugin.id.clone(),
            parameters,
            timeout_ms,
        }
    }

    /// Build a command from raw parameter text entered by the user.
    ///
    /// Blank text means "no parameters" and yields `{}`.
    pub fn from_json_text(plugin: &PluginRef, text: &str, timeout_ms: u64) -> Result<Self> {
        let trimmed = text.trim();
        let parameters = if trimmed.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(trimmed).map_err(|e| Error::InvalidParameters(e.to_string()))?
        };
        Ok(Self::with_timeout(plugin, parameters, timeout_ms))
    }

    /// The advisory timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
