//! CLI configuration.

use anyhow::{Context, Result};
use edge_core::BridgeConfig;
use edge_observability::LogConfig;
use serde::{Deserialize, Serialize};

/// CLI configuration file.
///
/// ```toml
/// [bridge]
/// site_id = "..."
/// deploy_id = "..."
///
/// [logging]
/// format = "human"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Store and purge settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Log settings.
    #[serde(default)]
    pub logging: LogConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::parse(path, &content)
    }

    fn parse(path: &str, content: &str) -> Result<Self> {
        if path.ends_with(".json") {
            serde_json::from_str(content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Overlay the process environment. Environment variables win.
    pub fn merge_env(self) -> Result<Self> {
        self.merge_lookup(|name| std::env::var(name).ok())
    }

    fn merge_lookup(mut self, get: impl Fn(&str) -> Option<String> + Copy) -> Result<Self> {
        self.bridge = self
            .bridge
            .merge_env(get)
            .context("Invalid environment configuration")?;
        if let Some(format) = get(edge_observability::LOG_FORMAT_ENV).filter(|v| !v.is_empty()) {
            self.logging.format = format.parse().context("Invalid log format")?;
        }
        Ok(self)
    }

    /// Bridge settings as JSON with the token redacted.
    pub fn redacted_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "bridge": self.bridge,
            "logging": self.logging,
        });
        if let Some(token) = value["bridge"].get_mut("api_token") {
            if !token.is_null() {
                *token = serde_json::Value::String("<redacted>".into());
            }
        }
        value
    }
}
