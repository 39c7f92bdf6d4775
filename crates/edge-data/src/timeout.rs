//! Timeout configuration for store and purge calls.

use std::time::Duration;

use edge_core::StoreConfig;

/// Timeout configuration for one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Connection timeout.
    pub connect: Duration,
    /// Total time for one attempt, including reading the body.
    pub total: Duration,
}

impl TimeoutConfig {
    /// Derive from a single total timeout; connecting may take a quarter of it.
    pub fn from_total(total: Duration) -> Self {
        Self {
            connect: total / 4,
            total,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::from_total(StoreConfig::default().timeout())
    }
}

impl From<&StoreConfig> for TimeoutConfig {
    fn from(config: &StoreConfig) -> Self {
        Self::from_total(config.timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_total_splits_connect() {
        let timeouts = TimeoutConfig::from_total(Duration::from_millis(800));
        assert_eq!(timeouts.connect, Duration::from_millis(200));
        assert_eq!(timeouts.total, Duration::from_millis(800));
    }

    #[test]
    fn test_from_store_config() {
        let config = StoreConfig {
            timeout_ms: 2_000,
            max_retries: 0,
        };
        let timeouts = TimeoutConfig::from(&config);
        assert_eq!(timeouts.total, Duration::from_secs(2));
    }
}
