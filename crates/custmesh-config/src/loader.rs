//! Configuration loader.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.custmesh`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.orchestrator.max_concurrent_workflows, 5);
    }

    #[test]
    fn test_load_basic_config() {
        let content = r#"
            [orchestrator]
            max_concurrent_workflows = 8

            [database]
            path = "/tmp/customers.db"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.orchestrator.max_concurrent_workflows, 8);
        assert_eq!(config.database.path, "/tmp/customers.db");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]").unwrap();
        writeln!(file, "max_concurrent_workflows = 2").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.orchestrator.max_concurrent_workflows, 2);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/custmesh.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("CUSTMESH_TEST_DB", "/tmp/env.db");
        let config = ConfigLoader::load_str(
            r#"
            [database]
            path = "${CUSTMESH_TEST_DB}"
        "#,
        )
        .unwrap();
        assert_eq!(config.database.path, "/tmp/env.db");
    }

    #[test]
    fn test_missing_env_var() {
        let result = ConfigLoader::load_str(
            r#"
            [database]
            path = "${CUSTMESH_DEFINITELY_UNSET}"
        "#,
        );
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_path() {
        let expanded = ConfigLoader::expand_path("~/.custmesh");
        assert!(!expanded.starts_with('~'));
    }

    #[test]
    fn test_zero_ceiling_rejected_at_load() {
        let result = ConfigLoader::load_str(
            r#"
            [orchestrator]
            max_concurrent_workflows = 0
        "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
