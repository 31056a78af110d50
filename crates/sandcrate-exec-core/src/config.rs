//! Configuration types for the plugin executor.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

/// Fixed path of the plugin-execution channel on the runtime.
pub const PLUGIN_CHANNEL_PATH: &str = "/ws/plugins";

/// Default advisory timeout for one execution, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Executor configuration loaded from YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Runtime endpoint settings
    pub endpoint: EndpointSettings,
    /// Execution settings
    pub execution: ExecutionSettings,
    /// Credential settings
    pub auth: AuthSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl ExecutorConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: ExecutorConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.endpoint.host.trim().is_empty() {
            return Err(Error::Config("endpoint.host cannot be empty".to_string()));
        }

        if self.endpoint.port == 0 {
            return Err(Error::Config("endpoint.port must be > 0".to_string()));
        }

        if !self.endpoint.path.starts_with('/') {
            return Err(Error::Config(format!(
                "endpoint.path must start with '/': {}",
                self.endpoint.path
            )));
        }

        if self.execution.default_timeout_ms == 0 {
            return Err(Error::Config(
                "execution.default_timeout_ms must be > 0".to_string(),
            ));
        }

        if let Some(token) = &self.auth.bearer_token {
            if token.trim().is_empty() {
                return Err(Error::Config(
                    "auth.bearer_token cannot be blank when set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Runtime endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EndpointSettings {
    /// Runtime host
    pub host: String,
    /// Runtime port
    pub port: u16,
    /// Use the encrypted transport (wss) instead of plaintext (ws)
    pub secure: bool,
    /// Channel path
    pub path: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            secure: false,
            path: PLUGIN_CHANNEL_PATH.to_string(),
        }
    }
}

impl EndpointSettings {
    /// URL scheme matching the transport security setting.
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }
}

/// Execution settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Timeout carried in each execute command, in milliseconds
    pub default_timeout_ms: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Credential settings.
///
/// The credential is injected by the caller; nothing is read from ambient
/// storage. When unset, the upgrade request carries no `Authorization`
/// header.
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
#[serde(default)]
pub struct AuthSettings {
    /// Bearer token attached to the transport upgrade request
    pub bearer_token: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
