//! Configuration Module
//!
//! This module defines all configuration structures for the pooler.
//! Configuration is loaded from TOML files and parsed using serde.

use crate::{scheduler::SchedulingPolicyType, validation::validate_targets};
use serde::Deserialize;
use std::fs;

/// Main configuration structure
///
/// Only `[aggregation]` is required; every other section has defaults.
///
/// # Example TOML
/// ```toml
/// [aggregation]
/// target_volume = 3.0
/// min_zone_group_size = 3
///
/// [scheduling]
/// policy_type = "PriorityValue"
///
/// [trigger]
/// interval_secs = 300
///
/// [api]
/// host = "127.0.0.1"
/// port = 8080
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Batch capacity configuration
///
/// # Fields
/// - `target_volume`: volume capacity of every batch (m³)
/// - `target_weight`: weight capacity (kg); defaults to `target_volume × 250`
/// - `min_zone_group_size`: smallest zone group that gets dedicated batches
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    pub target_volume: f64,
    #[serde(default)]
    pub target_weight: Option<f64>,
    #[serde(default = "default_min_zone_group_size")]
    pub min_zone_group_size: usize,
}

fn default_min_zone_group_size() -> usize {
    3
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            target_volume: 3.0,
            target_weight: None,
            min_zone_group_size: default_min_zone_group_size(),
        }
    }
}

/// Shipment ordering configuration
///
/// # Supported Policies
/// - `"PriorityValue"`: priority, then value score (default)
/// - `"Arrival"`: source order
/// - `"HeaviestFirst"`: weight descending
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default)]
    pub policy_type: SchedulingPolicyType,
}

/// Periodic processing configuration
///
/// # Fields
/// - `interval_secs`: time between processing cycles
/// - `run_on_start`: run a cycle immediately instead of waiting one interval
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

fn default_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_on_start: true,
        }
    }
}

/// Where processing cycles read shipments from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// In-memory pool fed through the API
    #[default]
    Pool,
    /// `bookings` table of the registry database
    Database,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
}

/// API server configuration
///
/// # Fields
/// - `host`: IP address to bind to (e.g., "127.0.0.1" or "0.0.0.0")
/// - `port`: TCP port to listen on
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration
///
/// # Fields
/// - `url`: SQLite connection URL (e.g., "sqlite://pooler.db")
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://pooler.db".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aggregation: AggregationConfig::default(),
            scheduling: SchedulingConfig::default(),
            trigger: TriggerConfig::default(),
            source: SourceConfig::default(),
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was read, parsed and has valid targets
    /// * `Err` otherwise
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        validate_targets(config.aggregation.target_volume, config.aggregation.target_weight)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml("[aggregation]\ntarget_volume = 5.0\n").unwrap();

        assert_eq!(config.aggregation.target_volume, 5.0);
        assert_eq!(config.aggregation.target_weight, None);
        assert_eq!(config.aggregation.min_zone_group_size, 3);
        assert_eq!(config.scheduling.policy_type, SchedulingPolicyType::PriorityValue);
        assert_eq!(config.trigger.interval_secs, 300);
        assert!(config.trigger.run_on_start);
        assert_eq!(config.source.kind, SourceKind::Pool);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.database.url, "sqlite://pooler.db");
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [aggregation]
            target_volume = 2.5
            target_weight = 400.0
            min_zone_group_size = 4

            [scheduling]
            policy_type = "HeaviestFirst"

            [trigger]
            interval_secs = 60
            run_on_start = false

            [source]
            kind = "database"

            [api]
            host = "0.0.0.0"
            port = 9000

            [database]
            url = "sqlite::memory:"
            "#,
        )
        .unwrap();

        assert_eq!(config.aggregation.target_weight, Some(400.0));
        assert_eq!(config.aggregation.min_zone_group_size, 4);
        assert_eq!(config.scheduling.policy_type, SchedulingPolicyType::HeaviestFirst);
        assert_eq!(config.trigger.interval_secs, 60);
        assert!(!config.trigger.run_on_start);
        assert_eq!(config.source.kind, SourceKind::Database);
        assert_eq!(config.api.host, "0.0.0.0");
    }

    #[test]
    fn test_rejects_non_positive_targets() {
        assert!(Config::from_toml("[aggregation]\ntarget_volume = 0.0\n").is_err());
        assert!(Config::from_toml("[aggregation]\ntarget_volume = 1.0\ntarget_weight = -5.0\n").is_err());
        assert!(Config::from_toml("[scheduling]\npolicy_type = \"Arrival\"\n").is_err());
    }
}
