//! # Custmesh Config
//!
//! Configuration management for the custmesh orchestration core.

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{Config, DatabaseConfig, OrchestratorConfig};
