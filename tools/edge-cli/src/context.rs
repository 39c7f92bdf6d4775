//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use edge_cache::{CacheHandler, RevalidationPropagator};
use edge_core::BridgeConfig;
use edge_data::{FetchClient, HttpTransport, StoreSelector};
use edge_observability::{init_logging, LogLevel};

use crate::config::CliConfig;
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Output handler.
    pub output: Output,
    bridge: Arc<BridgeConfig>,
}

impl Context {
    /// Load context from config file and environment, and install logging.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config = if let Some(path) = config_path {
            CliConfig::load(path)?
        } else {
            // Try to find config in current directory or parent directories
            Self::find_config(&cwd).unwrap_or_default()
        };
        let config = config.merge_env()?;

        let mut logging = config.logging;
        if output.is_verbose() {
            logging.level = LogLevel::Debug;
        }
        init_logging(&logging).context("Failed to initialize logging")?;

        Ok(Self {
            bridge: Arc::new(config.bridge.clone()),
            config,
            output,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<CliConfig> {
        let config_names = ["edge.toml", ".edge.toml", "edge.json"];

        let mut current = PathBuf::from(start);
        loop {
            for name in &config_names {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = CliConfig::load(config_path.to_str()?) {
                        return Some(config);
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Shared bridge configuration.
    pub fn bridge(&self) -> Arc<BridgeConfig> {
        self.bridge.clone()
    }

    /// Transport for platform API traffic.
    pub fn transport(&self) -> Result<Arc<dyn HttpTransport>> {
        let client = FetchClient::from_store_config(&self.bridge.store)
            .context("Failed to create HTTP client")?;
        Ok(Arc::new(client))
    }

    /// CDN purge propagator.
    pub fn propagator(&self) -> Result<Arc<RevalidationPropagator>> {
        Ok(Arc::new(RevalidationPropagator::new(
            self.bridge(),
            self.transport()?,
        )))
    }

    /// Cache handler against the configured deploy store.
    pub fn handler(&self) -> Result<CacheHandler> {
        self.bridge
            .validate()
            .context("Incomplete bridge configuration")?;
        let transport = self.transport()?;
        Ok(CacheHandler::new(
            Arc::new(StoreSelector::new(self.bridge(), transport.clone())),
            Arc::new(RevalidationPropagator::new(self.bridge(), transport)),
        ))
    }
}
