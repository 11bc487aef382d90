//! Configuration management for Scholar.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`SCHOLAR__` prefix, `__` separator,
//!    e.g. `SCHOLAR__NEO4J__URI`)
//! 2. Config file (`scholar.toml`, optional)
//! 3. Defaults

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScholarError};
use crate::schema::{SchemaDefinition, SchemaRegistry};

/// Default config file name, without extension.
pub const DEFAULT_CONFIG_FILE: &str = "scholar";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SCHOLAR";

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub neo4j: Neo4jSettings,

    #[serde(default)]
    pub query: QuerySettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Replaces the built-in research schema when present.
    #[serde(default)]
    pub schema: Option<SchemaDefinition>,
}

/// Connection settings for the graph database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Target database; the server default when unset.
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

/// Bounds applied to every validated query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Ceiling for result limits; larger limits are clamped, missing ones injected.
    #[serde(default = "default_max_result_limit")]
    pub max_result_limit: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt, for retryable failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Relationship-discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Name of the in-memory graph projection used for centrality.
    #[serde(default = "default_projection_name")]
    pub projection_name: String,

    /// Candidates fetched per evidence category before scoring.
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: u64,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> usize {
    16
}

fn default_fetch_size() -> usize {
    500
}

fn default_max_result_limit() -> u64 {
    500
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_projection_name() -> String {
    "research_graph".to_string()
}

fn default_candidate_limit() -> u64 {
    50
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: String::new(),
            database: None,
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_result_limit: default_max_result_limit(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            projection_name: default_projection_name(),
            candidate_limit: default_candidate_limit(),
        }
    }
}

impl QuerySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Settings {
    /// Load settings from `<file_prefix>.toml` (if present) and the environment.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        tracing::debug!(
            uri = %settings.neo4j.uri,
            max_result_limit = settings.query.max_result_limit,
            custom_schema = settings.schema.is_some(),
            "Settings loaded"
        );
        Ok(settings)
    }

    /// Reject values that would make every query fail.
    pub fn validate(&self) -> Result<()> {
        if self.query.max_result_limit == 0 {
            return Err(invalid("query.max_result_limit", "must be positive"));
        }
        if self.query.timeout_ms == 0 {
            return Err(invalid("query.timeout_ms", "must be positive"));
        }
        if self.discovery.candidate_limit == 0 {
            return Err(invalid("discovery.candidate_limit", "must be positive"));
        }
        if self.discovery.projection_name.trim().is_empty() {
            return Err(invalid("discovery.projection_name", "must not be empty"));
        }
        if let Some(schema) = &self.schema {
            if schema.entities.is_empty() {
                return Err(invalid("schema.entities", "at least one entity kind is required"));
            }
        }
        Ok(())
    }

    /// The schema registry described by these settings.
    pub fn schema_registry(&self) -> SchemaRegistry {
        match &self.schema {
            Some(def) => SchemaRegistry::from_definition(def),
            None => SchemaRegistry::research(),
        }
    }

    /// Install the configured schema as the process-wide registry.
    pub fn install_schema(&self) -> Result<&'static SchemaRegistry> {
        SchemaRegistry::install_global(self.schema_registry())
            .map_err(|_| ScholarError::SchemaAlreadyInstalled)
    }
}

fn invalid(key: &str, reason: &str) -> ScholarError {
    ScholarError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("scholar.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        dir.path().join("scholar").to_string_lossy().into_owned()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(settings.query.max_result_limit, 500);
        assert_eq!(settings.query.timeout(), Duration::from_secs(30));
        assert_eq!(settings.discovery.projection_name, "research_graph");
        assert!(settings.schema.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent").to_string_lossy().into_owned();
        let settings = Settings::load(&prefix).unwrap();
        assert_eq!(settings.query.max_result_limit, 500);
        assert_eq!(settings.neo4j.user, "neo4j");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_config(
            &dir,
            r#"
[neo4j]
uri = "bolt://graph.internal:7687"
database = "research"

[query]
max_result_limit = 100
timeout_ms = 5000
"#,
        );
        let settings = Settings::load(&prefix).unwrap();
        assert_eq!(settings.neo4j.uri, "bolt://graph.internal:7687");
        assert_eq!(settings.neo4j.database.as_deref(), Some("research"));
        assert_eq!(settings.query.max_result_limit, 100);
        assert_eq!(settings.query.timeout_ms, 5000);
        // Untouched sections keep their defaults.
        assert_eq!(settings.query.max_retries, 3);
        assert_eq!(settings.discovery.candidate_limit, 50);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_config(&dir, "[query]\nmax_result_limit = 0\n");
        let err = Settings::load(&prefix).unwrap_err();
        assert!(matches!(err, ScholarError::InvalidSetting { ref key, .. } if key == "query.max_result_limit"));
    }

    #[test]
    fn test_schema_section() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_config(
            &dir,
            r#"
[[schema.entities]]
name = "Paper"

[[schema.entities.properties]]
name = "doi"
aliases = ["identifier"]

[[schema.relationships]]
name = "CITES"
aliases = ["REFERENCES"]
"#,
        );
        let settings = Settings::load(&prefix).unwrap();
        let registry = settings.schema_registry();
        assert!(registry.lookup_entity_kind("Paper"));
        assert!(!registry.lookup_entity_kind("Work"));
        assert_eq!(registry.resolve_property_alias("Paper", "identifier"), Some("doi"));
        assert_eq!(registry.resolve_relationship_alias("REFERENCES"), Some("CITES"));
    }
}
