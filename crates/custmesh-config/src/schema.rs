//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Check value ranges after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.max_concurrent_workflows == 0 {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.max_concurrent_workflows".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Orchestration engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Ceiling on workflows in pending/running status.
    #[serde(default = "default_max_concurrent_workflows")]
    pub max_concurrent_workflows: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: default_max_concurrent_workflows(),
        }
    }
}

fn default_max_concurrent_workflows() -> usize {
    5
}

/// Customer database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path. `:memory:` opens a transient database.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "custmesh.db".to_string()
}
