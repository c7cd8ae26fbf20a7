//! Configuration for the codegraph core.
//!
//! Hierarchical loading via figment: programmatic defaults, then
//! `codegraph.yaml`, then `CODEGRAPH_*` environment variables.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
    #[error("Database URL cannot be empty")]
    EmptyDatabaseUrl,
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),
    #[error("Invalid wait_timeout_ms: {0}. Must be positive")]
    InvalidWaitTimeout(u64),
    #[error("Invalid history_capacity: {0}. Must be at least 1")]
    InvalidHistoryCapacity(usize),
    #[error("Invalid mailbox_capacity: {0}. Must be at least 1")]
    InvalidMailboxCapacity(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:codegraph.db`.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite:codegraph.db".to_string(), max_connections: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Default deadline for `waitForCommand`.
    pub wait_timeout_ms: u64,
    /// Bounded audit history: oldest entries drop first.
    pub history_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self { wait_timeout_ms: 300_000, history_capacity: 1000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Per-subscriber mailbox bound; overflowing subscribers are dropped.
    pub mailbox_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { mailbox_capacity: 256 }
    }
}

/// Top-level configuration honored by the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    pub events: EventBusConfig,
}

impl CoreConfig {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest): programmatic defaults, then
    /// `codegraph.yaml` in the working directory, then `CODEGRAPH_*`
    /// environment variables (`__` separates nesting levels).
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file("codegraph.yaml"))
            .merge(Env::prefixed("CODEGRAPH_").split("__"))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, for tests and embedding.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(self.database.max_connections));
        }
        if self.broker.wait_timeout_ms == 0 {
            return Err(ConfigError::InvalidWaitTimeout(self.broker.wait_timeout_ms));
        }
        if self.broker.history_capacity == 0 {
            return Err(ConfigError::InvalidHistoryCapacity(self.broker.history_capacity));
        }
        if self.events.mailbox_capacity == 0 {
            return Err(ConfigError::InvalidMailboxCapacity(self.events.mailbox_capacity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.broker.wait_timeout_ms, 300_000);
        assert_eq!(config.broker.history_capacity, 1000);
        assert_eq!(config.events.mailbox_capacity, 256);
    }

    #[test]
    fn empty_database_url_rejected() {
        let config = CoreConfig {
            database: DatabaseConfig { url: "  ".into(), max_connections: 5 },
            ..CoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyDatabaseUrl)));
    }

    #[test]
    fn file_values_override_defaults() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database:\n  url: sqlite:from-file.db\nbroker:\n  history_capacity: 25"
        )
        .unwrap();

        let config = CoreConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.database.url, "sqlite:from-file.db");
        assert_eq!(config.broker.history_capacity, 25);
        // Untouched sections keep their defaults.
        assert_eq!(config.broker.wait_timeout_ms, 300_000);
        assert_eq!(config.events.mailbox_capacity, 256);
    }

    #[test]
    fn zero_capacities_rejected() {
        let config = CoreConfig {
            broker: BrokerConfig { wait_timeout_ms: 300_000, history_capacity: 0 },
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CoreConfig {
            events: EventBusConfig { mailbox_capacity: 0 },
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
