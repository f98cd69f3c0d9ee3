//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.path.is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }
    if config.source.r#type != "sqlite" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'sqlite', got '{}'",
            config.source.r#type
        )));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.r#type != "mysql" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'mysql', got '{}'",
            config.target.r#type
        )));
    }
    match config.target.ssl_mode.to_lowercase().as_str() {
        "disable" | "prefer" | "require" | "verify-ca" | "verify_ca" | "verify-full"
        | "verify_identity" => {}
        other => {
            return Err(MigrateError::Config(format!(
                "target.ssl_mode '{}' is not one of disable, prefer, require, verify-ca, verify-full",
                other
            )));
        }
    }

    // Migration config validation - only check if explicitly set
    if let Some(0) = config.migration.workers {
        return Err(MigrateError::Config(
            "migration.workers must be at least 1".into(),
        ));
    }
    if let Some(0) = config.migration.chunk_size {
        return Err(MigrateError::Config(
            "migration.chunk_size must be at least 1".into(),
        ));
    }
    if let Some(0) = config.migration.read_ahead_buffers {
        return Err(MigrateError::Config(
            "migration.read_ahead_buffers must be at least 1".into(),
        ));
    }
    if let Some(0) = config.migration.max_target_connections {
        return Err(MigrateError::Config(
            "migration.max_target_connections must be at least 1".into(),
        ));
    }
    for (table, column) in &config.migration.key_overrides {
        if table.is_empty() || column.is_empty() {
            return Err(MigrateError::Config(format!(
                "migration.key_overrides entry '{}: {}' must name both a table and a column",
                table, column
            )));
        }
    }

    if let Some(fetch) = &config.fetch {
        if fetch.command.trim().is_empty() {
            return Err(MigrateError::Config("fetch.command is required".into()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchConfig, MigrationConfig, SourceConfig, TargetConfig};
    use std::collections::BTreeMap;

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                r#type: "sqlite".to_string(),
                path: "/data/db.sqlite".to_string(),
            },
            target: TargetConfig {
                r#type: "mysql".to_string(),
                host: "localhost".to_string(),
                port: 3306,
                database: "target_db".to_string(),
                user: "etl".to_string(),
                password: "password".to_string(),
                ssl_mode: "disable".to_string(),
            },
            migration: MigrationConfig::default(),
            fetch: None,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_path() {
        let mut config = valid_config();
        config.source.path = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_database() {
        let mut config = valid_config();
        config.target.database = "".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("target.database"));
    }

    #[test]
    fn test_wrong_source_type() {
        let mut config = valid_config();
        config.source.r#type = "postgres".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_target_type() {
        let mut config = valid_config();
        config.target.r#type = "postgres".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_ssl_mode() {
        let mut config = valid_config();
        config.target.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_workers() {
        let mut config = valid_config();
        config.migration.workers = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_override_column() {
        let mut config = valid_config();
        config.migration.key_overrides = BTreeMap::from([("t".to_string(), "".to_string())]);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_fetch_command() {
        let mut config = valid_config();
        config.fetch = Some(FetchConfig {
            command: "  ".to_string(),
            args: vec![],
            env: BTreeMap::new(),
            working_dir: None,
            timeout_secs: None,
        });
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
