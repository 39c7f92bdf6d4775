//! Deploy and store configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default platform API host.
pub const DEFAULT_API_HOST: &str = "https://api.netlify.com";

/// Region requested when regional blobs are enabled and no region is set.
pub const DEFAULT_BLOBS_REGION: &str = "auto";

/// Environment variable names read by [`BridgeConfig::from_env`].
pub mod env_vars {
    /// Deploy identifier; part of the store namespace.
    pub const DEPLOY_ID: &str = "EDGE_DEPLOY_ID";
    /// Site identifier.
    pub const SITE_ID: &str = "EDGE_SITE_ID";
    /// Platform API host.
    pub const API_HOST: &str = "EDGE_API_HOST";
    /// Platform API token.
    pub const API_TOKEN: &str = "EDGE_API_TOKEN";
    /// Prefer a region-scoped store (`true` / `1`).
    pub const USE_REGIONAL_BLOBS: &str = "EDGE_USE_REGIONAL_BLOBS";
    /// Region name used for the region-scoped store.
    pub const BLOBS_REGION: &str = "EDGE_BLOBS_REGION";
    /// Total timeout for a single store call, in milliseconds.
    pub const STORE_TIMEOUT_MS: &str = "EDGE_STORE_TIMEOUT_MS";
    /// Retries for a failed store call.
    pub const STORE_MAX_RETRIES: &str = "EDGE_STORE_MAX_RETRIES";
}

/// Errors raised while building or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Transport settings for blob store calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Total timeout for one store call, in milliseconds.
    pub timeout_ms: u64,
    /// Number of retries after a failed call.
    pub max_retries: u32,
}

impl StoreConfig {
    /// Total timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3_000,
            max_retries: 1,
        }
    }
}

/// Configuration for the cache bridge, resolved once at cold start and
/// shared read-only (usually behind an `Arc`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Deploy identifier.
    pub deploy_id: Option<String>,
    /// Site identifier.
    pub site_id: Option<String>,
    /// Platform API host, without trailing slash.
    pub api_host: String,
    /// Platform API token.
    pub api_token: Option<String>,
    /// Whether to use a region-scoped store instead of the global one.
    pub use_regional_blobs: bool,
    /// Region used when `use_regional_blobs` is set.
    pub blobs_region: String,
    /// Store transport settings.
    pub store: StoreConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            deploy_id: None,
            site_id: None,
            api_host: DEFAULT_API_HOST.to_string(),
            api_token: None,
            use_regional_blobs: false,
            blobs_region: DEFAULT_BLOBS_REGION.to_string(),
            store: StoreConfig::default(),
        }
    }
}

// Hand-written so the token never ends up in logs.
impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("deploy_id", &self.deploy_id)
            .field("site_id", &self.site_id)
            .field("api_host", &self.api_host)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("use_regional_blobs", &self.use_regional_blobs)
            .field("blobs_region", &self.blobs_region)
            .field("store", &self.store)
            .finish()
    }
}

impl BridgeConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::default().merge_env(|name| std::env::var(name).ok())
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay values from an environment lookup. Set variables win over
    /// values already present.
    pub fn merge_env<F>(mut self, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env_vars::DEPLOY_ID) {
            self.deploy_id = Some(v);
        }
        if let Some(v) = get(env_vars::SITE_ID) {
            self.site_id = Some(v);
        }
        if let Some(v) = get(env_vars::API_HOST) {
            self.api_host = v;
        }
        if let Some(v) = get(env_vars::API_TOKEN) {
            self.api_token = Some(v);
        }
        if let Some(v) = get(env_vars::USE_REGIONAL_BLOBS) {
            self.use_regional_blobs = parse_flag(env_vars::USE_REGIONAL_BLOBS, &v)?;
        }
        if let Some(v) = get(env_vars::BLOBS_REGION) {
            self.blobs_region = v;
        }
        if let Some(v) = get(env_vars::STORE_TIMEOUT_MS) {
            self.store.timeout_ms = parse_number(env_vars::STORE_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = get(env_vars::STORE_MAX_RETRIES) {
            self.store.max_retries = parse_number(env_vars::STORE_MAX_RETRIES, &v)?;
        }

        self.api_host = self.api_host.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Deploy identifier, or an error if unset.
    pub fn require_deploy_id(&self) -> Result<&str, ConfigurationError> {
        require(&self.deploy_id, env_vars::DEPLOY_ID)
    }

    /// Site identifier, or an error if unset.
    pub fn require_site_id(&self) -> Result<&str, ConfigurationError> {
        require(&self.site_id, env_vars::SITE_ID)
    }

    /// API token, or an error if unset.
    pub fn require_api_token(&self) -> Result<&str, ConfigurationError> {
        require(&self.api_token, env_vars::API_TOKEN)
    }

    /// Check that everything needed to open a store is present.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.require_deploy_id()?;
        self.require_site_id()?;
        self.require_api_token()?;
        if self.api_host.is_empty() {
            return Err(ConfigurationError::Missing(env_vars::API_HOST));
        }
        Ok(())
    }
}

fn require<'a>(
    value: &'a Option<String>,
    name: &'static str,
) -> Result<&'a str, ConfigurationError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigurationError::Missing(name))
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigurationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigurationError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    value: &str,
) -> Result<T, ConfigurationError> {
    value.trim().parse().map_err(|_| ConfigurationError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.api_host, DEFAULT_API_HOST);
        assert_eq!(config.blobs_region, DEFAULT_BLOBS_REGION);
        assert!(!config.use_regional_blobs);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_env_reads_all_values() {
        let config = BridgeConfig::default()
            .merge_env(env(&[
                (env_vars::DEPLOY_ID, "deploy-1"),
                (env_vars::SITE_ID, "site-1"),
                (env_vars::API_HOST, "https://api.example.com/"),
                (env_vars::API_TOKEN, "secret"),
                (env_vars::USE_REGIONAL_BLOBS, "TRUE"),
                (env_vars::BLOBS_REGION, "us-east-2"),
                (env_vars::STORE_TIMEOUT_MS, "750"),
                (env_vars::STORE_MAX_RETRIES, "3"),
            ]))
            .unwrap();

        assert_eq!(config.deploy_id.as_deref(), Some("deploy-1"));
        assert_eq!(config.site_id.as_deref(), Some("site-1"));
        assert_eq!(config.api_host, "https://api.example.com");
        assert!(config.use_regional_blobs);
        assert_eq!(config.blobs_region, "us-east-2");
        assert_eq!(config.store.timeout(), Duration::from_millis(750));
        assert_eq!(config.store.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let config = BridgeConfig::default()
            .merge_env(env(&[(env_vars::API_TOKEN, "  ")]))
            .unwrap();
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let err = BridgeConfig::default()
            .merge_env(env(&[(env_vars::USE_REGIONAL_BLOBS, "maybe")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::Invalid { name, .. } if name == env_vars::USE_REGIONAL_BLOBS
        ));
    }

    #[test]
    fn test_missing_token_is_configuration_error() {
        let config = BridgeConfig {
            deploy_id: Some("d".into()),
            site_id: Some("s".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Missing(env_vars::API_TOKEN))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = BridgeConfig {
            api_token: Some("super-secret".into()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config: BridgeConfig = toml::from_str(
            r#"
            deploy_id = "abc"
            site_id = "site"
            use_regional_blobs = true

            [store]
            timeout_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.deploy_id.as_deref(), Some("abc"));
        assert!(config.use_regional_blobs);
        assert_eq!(config.store.timeout_ms, 1000);
        assert_eq!(config.store.max_retries, StoreConfig::default().max_retries);
        assert_eq!(config.api_host, DEFAULT_API_HOST);
    }
}
