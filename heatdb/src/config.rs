//! Configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` but can be specified via the `-f` flag or the `HEATDB_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `HEATDB_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! Nested values use double underscores, e.g. `HEATDB_DATABASE__POOL__MAX_CONNECTIONS=4`.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! DATABASE_URL="sqlite://heat.db"
//! HEATDB_DATABASE__POOL__BUSY_TIMEOUT=10s
//! HEATDB_LOG_FORMAT=compact
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "HEATDB_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without touching the database.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run pending migrations and check the schema (the default)
    Sync,
    /// List live stacks with their resource counts
    Stacks,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub log_format: LogFormat,
    /// Raw `DATABASE_URL`, folded into `database.url` on load
    #[serde(skip_serializing)]
    database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite connection string, e.g. `sqlite://heat.db` or `sqlite::memory:`
    pub url: String,
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://heat.db".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| match e {
            Error::Config { message } => figment::Error::from(message),
            other => figment::Error::from(other.to_string()),
        })?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("HEATDB_").split("__").ignore(&["CONFIG"]))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.database.url.trim().is_empty() {
            return Err(Error::Config {
                message: "database.url must not be empty. Set DATABASE_URL or add database.url to the config file."
                    .to_string(),
            });
        }

        let pool = &self.database.pool;
        if pool.min_connections > pool.max_connections {
            return Err(Error::Config {
                message: format!(
                    "database.pool.min_connections ({}) cannot be greater than max_connections ({})",
                    pool.min_connections, pool.max_connections
                ),
            });
        }

        if pool.max_connections == 0 {
            return Err(Error::Config {
                message: "database.pool.max_connections must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(config: &str) -> Args {
        Args {
            config: config.to_string(),
            validate: false,
            command: None,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.database.url, "sqlite://heat.db");
            assert_eq!(config.database.pool.max_connections, 5);
            assert_eq!(config.database.pool.busy_timeout, Duration::from_secs(5));
            assert_eq!(config.log_format, LogFormat::Pretty);

            Ok(())
        });
    }

    #[test]
    fn test_yaml_and_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
database:
  url: sqlite://from-yaml.db
  pool:
    max_connections: 8
    acquire_timeout: 2s
log_format: compact
"#,
            )?;

            jail.set_env("HEATDB_DATABASE__POOL__BUSY_TIMEOUT", "250ms");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.database.url, "sqlite://from-yaml.db");
            assert_eq!(config.database.pool.max_connections, 8);
            assert_eq!(config.database.pool.acquire_timeout, Duration::from_secs(2));
            assert_eq!(config.database.pool.busy_timeout, Duration::from_millis(250));
            assert_eq!(config.log_format, LogFormat::Compact);

            Ok(())
        });
    }

    #[test]
    fn test_database_url_wins() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
database:
  url: sqlite://from-yaml.db
"#,
            )?;

            jail.set_env("HEATDB_DATABASE__URL", "sqlite://from-prefixed-env.db");
            jail.set_env("DATABASE_URL", "sqlite://from-env.db");

            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.database.url, "sqlite://from-env.db");

            Ok(())
        });
    }

    #[test]
    fn test_invalid_pool_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
database:
  pool:
    max_connections: 2
    min_connections: 3
"#,
            )?;

            let err = Error::from(Config::load(&args("test.yaml")).unwrap_err());
            assert!(err.to_string().contains("min_connections"), "unexpected error: {err}");
            assert!(matches!(err, Error::Config { .. }));
            assert_eq!(err.exit_code(), 2);

            Ok(())
        });
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let mut config = Config::default();
        config.database.url = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "databse:\n  url: sqlite://typo.db\n")?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }
}
