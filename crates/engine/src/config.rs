//! Engine configuration via `hotswap.toml`
//!
//! A single config file in the project's data directory. On first open a
//! default `hotswap.toml` is created; to change settings, edit the file and
//! restart the engine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use hotswap_core::{EngineLimits, HotswapError, Result};
use hotswap_migrate::{MigrationConfig, MigrationStrategy};
use hotswap_recovery::RecoveryConfig;

/// Config file name placed in the engine data directory.
pub const CONFIG_FILE_NAME: &str = "hotswap.toml";

/// `[migration]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationSection {
    /// Migration strategy: `"automatic"` or `"manual"`.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Wall-clock budget per migration in milliseconds
    #[serde(default = "default_migration_timeout_ms")]
    pub timeout_ms: u64,
    /// Additional attempts after the first failure
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Wait between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Permit breaking version jumps (manual override)
    #[serde(default)]
    pub allow_breaking: bool,
}

impl Default for MigrationSection {
    fn default() -> Self {
        MigrationSection {
            strategy: default_strategy(),
            timeout_ms: default_migration_timeout_ms(),
            retry_count: default_retry_count(),
            backoff_ms: default_backoff_ms(),
            allow_breaking: false,
        }
    }
}

/// `[rollback]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollbackSection {
    /// Snapshots retained per artifact
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
}

impl Default for RollbackSection {
    fn default() -> Self {
        RollbackSection {
            history_depth: default_history_depth(),
        }
    }
}

/// `[recovery]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoverySection {
    /// Rebuild attempts per failure
    #[serde(default = "default_retry_count")]
    pub max_retries: u32,
    /// Wait before each rebuild attempt in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Consecutive fallbacks that trip the circuit breaker
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
}

impl Default for RecoverySection {
    fn default() -> Self {
        RecoverySection {
            max_retries: default_retry_count(),
            backoff_ms: default_backoff_ms(),
            breaker_threshold: default_breaker_threshold(),
        }
    }
}

fn default_strategy() -> String {
    "automatic".to_string()
}

fn default_migration_timeout_ms() -> u64 {
    30_000
}

fn default_retry_count() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    100
}

fn default_history_depth() -> usize {
    8
}

fn default_breaker_threshold() -> u32 {
    3
}

fn default_node_capacity() -> usize {
    4096
}

fn default_max_depth() -> usize {
    16
}

fn default_max_cascade_queue() -> usize {
    1024
}

/// Engine configuration loaded from `hotswap.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum dependency graph nodes
    #[serde(default = "default_node_capacity")]
    pub node_capacity: usize,
    /// Cycle-detection depth safety cutoff
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum cascade frontier before `CapacityExceeded`
    #[serde(default = "default_max_cascade_queue")]
    pub max_cascade_queue: usize,
    /// Migration budget and strategy
    #[serde(default)]
    pub migration: MigrationSection,
    /// Rollback history bound
    #[serde(default)]
    pub rollback: RollbackSection,
    /// Recovery budget and breaker threshold
    #[serde(default)]
    pub recovery: RecoverySection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            node_capacity: default_node_capacity(),
            max_depth: default_max_depth(),
            max_cascade_queue: default_max_cascade_queue(),
            migration: MigrationSection::default(),
            rollback: RollbackSection::default(),
            recovery: RecoverySection::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| HotswapError::invalid_input(format!("invalid {}: {}", CONFIG_FILE_NAME, e)))
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load `hotswap.toml` from `dir`, writing the default file first if it
    /// does not exist.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            fs::write(&path, Self::default_toml())?;
        }
        Self::load(&path)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Hotswap engine configuration
#
# node_capacity     = 4096   # dependency graph node bound
# max_depth         = 16     # cycle-detection depth safety cutoff
# max_cascade_queue = 1024   # cascade frontier bound (overflow is an error)

[migration]
# strategy = "automatic"     # or "manual" (required for breaking jumps)
# timeout_ms = 30000
# retry_count = 3
# backoff_ms = 100
# allow_breaking = false

[rollback]
# history_depth = 8          # snapshots retained per artifact

[recovery]
# max_retries = 3
# backoff_ms = 100
# breaker_threshold = 3      # consecutive fallbacks before giving up
"#
    }

    /// Graph and history bounds derived from this config
    pub fn limits(&self) -> EngineLimits {
        EngineLimits {
            max_nodes: self.node_capacity,
            max_depth: self.max_depth,
            max_cascade_queue: self.max_cascade_queue,
            rollback_history: self.rollback.history_depth,
            version_history: EngineLimits::default().version_history,
        }
    }

    /// Parse the `[migration]` section into a controller config.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy string is not `"automatic"` or
    /// `"manual"`.
    pub fn migration_config(&self) -> Result<MigrationConfig> {
        let strategy: MigrationStrategy = self.migration.strategy.parse()?;
        Ok(MigrationConfig {
            strategy,
            timeout_ms: self.migration.timeout_ms,
            retry_count: self.migration.retry_count,
            backoff_ms: self.migration.backoff_ms,
            allow_breaking: self.migration.allow_breaking,
        })
    }

    /// The `[recovery]` section as a policy config
    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            max_retries: self.recovery.max_retries,
            backoff_ms: self.recovery.backoff_ms,
            breaker_threshold: self.recovery.breaker_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config.node_capacity, 4096);
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.max_cascade_queue, 1024);
        assert_eq!(config.migration.timeout_ms, 30_000);
        assert_eq!(config.rollback.history_depth, 8);
        assert_eq!(config.recovery.breaker_threshold, 3);
    }

    #[test]
    fn test_default_toml_parses_to_defaults() {
        let config = EngineConfig::from_toml(EngineConfig::default_toml()).unwrap();
        assert_eq!(config.node_capacity, EngineConfig::default().node_capacity);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml(
            r#"
            max_cascade_queue = 64

            [migration]
            strategy = "manual"
            retry_count = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.max_cascade_queue, 64);
        assert_eq!(config.migration.retry_count, 1);
        // Untouched fields keep defaults
        assert_eq!(config.migration.timeout_ms, 30_000);
        let mc = config.migration_config().unwrap();
        assert_eq!(mc.strategy, hotswap_migrate::MigrationStrategy::Manual);
    }

    #[test]
    fn test_invalid_strategy_is_rejected() {
        let config = EngineConfig::from_toml(
            r#"
            [migration]
            strategy = "yolo"
            "#,
        )
        .unwrap();
        assert!(config.migration_config().is_err());
    }

    #[test]
    fn test_invalid_toml_reports_invalid_input() {
        let err = EngineConfig::from_toml("node_capacity = \"many\"").unwrap_err();
        assert!(matches!(err, HotswapError::InvalidInput(_)));
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config.node_capacity, 4096);
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
        // Second load reads the file it just wrote
        let again = EngineConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(again.node_capacity, config.node_capacity);
    }

    #[test]
    fn test_limits_mapping() {
        let config = EngineConfig::from_toml("node_capacity = 10\nmax_depth = 5").unwrap();
        let limits = config.limits();
        assert_eq!(limits.max_nodes, 10);
        assert_eq!(limits.max_depth, 5);
        assert_eq!(limits.rollback_history, 8);
    }
}
