//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source_servers.is_empty() {
        return Err(MigrateError::Config(
            "at least one source_servers entry is required".into(),
        ));
    }

    for (name, server) in &config.source_servers {
        if server.host.is_empty() {
            return Err(MigrateError::Config(format!(
                "source_servers.{}.host is required",
                name
            )));
        }
        if server.user.is_empty() {
            return Err(MigrateError::Config(format!(
                "source_servers.{}.user is required",
                name
            )));
        }
    }

    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if config.migration.max_table_name_len < 1 {
        return Err(MigrateError::Config(
            "migration.max_table_name_len must be at least 1".into(),
        ));
    }

    if config.jobs.is_empty() {
        return Err(MigrateError::Config("at least one job is required".into()));
    }

    for (idx, job) in config.jobs.iter().enumerate() {
        if job.source_database.is_empty() {
            return Err(MigrateError::Config(format!(
                "jobs[{}].source_database is required",
                idx
            )));
        }
        if job.target_database.is_empty() {
            return Err(MigrateError::Config(format!(
                "jobs[{}].target_database is required",
                idx
            )));
        }
        if job.target_schema.is_empty() {
            return Err(MigrateError::Config(format!(
                "jobs[{}].target_schema is required",
                idx
            )));
        }
        if !config.source_servers.contains_key(&job.source_instance) {
            return Err(MigrateError::Config(format!(
                "jobs[{}].source_instance '{}' is not defined in source_servers",
                idx, job.source_instance
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JobConfig, MigrationSettings, ServerConfig, TargetServerConfig};
    use std::collections::HashMap;

    fn valid_config() -> Config {
        let mut source_servers = HashMap::new();
        source_servers.insert(
            "BD01".to_string(),
            ServerConfig {
                host: "192.168.0.80".to_string(),
                port: 1433,
                user: "info".to_string(),
                password: "secret".to_string(),
                encrypt: "false".to_string(),
                trust_server_cert: false,
            },
        );

        Config {
            source_servers,
            target: TargetServerConfig {
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "secret".to_string(),
            },
            migration: MigrationSettings::default(),
            jobs: vec![JobConfig {
                source_database: "CREF_RJ_SCF".to_string(),
                target_database: "efcontrol_registro".to_string(),
                target_schema: "rj".to_string(),
                source_instance: "BD01".to_string(),
                copy_data: true,
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source_servers.get_mut("BD01").unwrap().host = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_source_instance() {
        let mut config = valid_config();
        config.jobs[0].source_instance = "BD99".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_no_jobs() {
        let mut config = valid_config();
        config.jobs.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
    }
}
