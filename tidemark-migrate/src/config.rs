//! Configuration file parsing for `tidemark.toml`.
//!
//! ```toml
//! [database]
//! provider = "postgresql"
//! url = "${DATABASE_URL}"
//!
//! [migrations]
//! directory = "./migrations"
//! table_name = "_tidemark_migrations"
//!
//! [environments.test.database]
//! url = "postgres://localhost/app_test"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::MigrationConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::sql::{DEFAULT_LEDGER_TABLE, Dialect};

/// Main configuration structure for `tidemark.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TidemarkConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Migration settings.
    #[serde(default)]
    pub migrations: MigrationsSection,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl TidemarkConfig {
    /// Load configuration from a file path.
    pub async fn from_file(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MigrationError::io(path, e))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> MigrateResult<Self> {
        let expanded = expand_env_vars(content)?;
        toml::from_str(&expanded).map_err(|e| MigrationError::config(e.to_string()))
    }

    /// Get the database URL.
    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref()
    }

    /// SQL dialect of the configured provider.
    pub fn dialect(&self) -> Dialect {
        self.database.provider.dialect()
    }

    /// Engine configuration derived from the `[migrations]` section.
    pub fn migration_config(&self) -> MigrationConfig {
        MigrationConfig::new().migrations_dir(&self.migrations.directory)
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(db) = overrides.database {
                if let Some(url) = db.url {
                    self.database.url = Some(url);
                }
                if let Some(provider) = db.provider {
                    self.database.provider = provider;
                }
            }
            if let Some(migrations) = overrides.migrations {
                if let Some(directory) = migrations.directory {
                    self.migrations.directory = directory;
                }
                if let Some(table_name) = migrations.table_name {
                    self.migrations.table_name = table_name;
                }
            }
        }
        self
    }
}

/// Database configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database provider.
    #[serde(default)]
    pub provider: DatabaseProvider,

    /// Connection URL (supports `${ENV_VAR}` interpolation).
    pub url: Option<String>,
}

/// Supported database providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseProvider {
    /// PostgreSQL.
    #[default]
    #[serde(alias = "postgres")]
    PostgreSql,
    /// MySQL / MariaDB.
    #[serde(alias = "mariadb")]
    MySql,
    /// SQLite.
    #[serde(alias = "sqlite3")]
    Sqlite,
}

impl DatabaseProvider {
    /// Get the provider name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// SQL dialect spoken by this provider.
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::PostgreSql => Dialect::Postgres,
            Self::MySql => Dialect::MySql,
            Self::Sqlite => Dialect::Sqlite,
        }
    }
}

/// The `[migrations]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationsSection {
    /// Migration files directory.
    #[serde(default = "default_migrations_dir")]
    pub directory: PathBuf,

    /// Applied-migrations ledger table name.
    #[serde(default = "default_migrations_table")]
    pub table_name: String,
}

impl Default for MigrationsSection {
    fn default() -> Self {
        Self {
            directory: default_migrations_dir(),
            table_name: default_migrations_table(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("./migrations")
}

fn default_migrations_table() -> String {
    DEFAULT_LEDGER_TABLE.to_string()
}

/// Per-environment overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Database overrides.
    pub database: Option<DatabaseOverride>,
    /// Migration overrides.
    pub migrations: Option<MigrationsOverride>,
}

/// Overrides for the `[database]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOverride {
    /// Database provider.
    pub provider: Option<DatabaseProvider>,
    /// Connection URL.
    pub url: Option<String>,
}

/// Overrides for the `[migrations]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationsOverride {
    /// Migrations directory.
    pub directory: Option<PathBuf>,
    /// Ledger table name.
    pub table_name: Option<String>,
}

/// Replace `${VAR}` with the value of the environment variable. Unset
/// variables are left as written.
fn expand_env_vars(content: &str) -> MigrateResult<String> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| MigrationError::config(e.to_string()))?;

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TidemarkConfig::default();
        assert_eq!(config.database.provider, DatabaseProvider::PostgreSql);
        assert_eq!(config.migrations.table_name, "_tidemark_migrations");
        assert_eq!(config.dialect(), Dialect::Postgres);
    }

    #[test]
    fn test_parse_config() {
        let config = TidemarkConfig::from_str(
            r#"
            [database]
            provider = "sqlite3"
            url = "sqlite://app.db"

            [migrations]
            directory = "db/migrations"
            "#,
        )
        .unwrap();

        assert_eq!(config.dialect(), Dialect::Sqlite);
        assert_eq!(config.database_url(), Some("sqlite://app.db"));
        assert_eq!(
            config.migration_config().migrations_dir,
            PathBuf::from("db/migrations")
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = TidemarkConfig::from_str("[migrations]\nauto_migrate = true\n").unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: this test is the only user of the variable.
        unsafe { std::env::set_var("TIDEMARK_TEST_DB_URL", "postgres://localhost/test") };
        let expanded = expand_env_vars("url = \"${TIDEMARK_TEST_DB_URL}\"").unwrap();
        assert_eq!(expanded, "url = \"postgres://localhost/test\"");

        let untouched = expand_env_vars("url = \"${TIDEMARK_SURELY_UNSET}\"").unwrap();
        assert_eq!(untouched, "url = \"${TIDEMARK_SURELY_UNSET}\"");
    }

    #[test]
    fn test_environment_override() {
        let config = TidemarkConfig::from_str(
            r#"
            [database]
            url = "postgres://localhost/dev"

            [environments.test.database]
            url = "postgres://localhost/test"

            [environments.test.migrations]
            table_name = "schema_log"
            "#,
        )
        .unwrap()
        .with_environment("test");

        assert_eq!(config.database_url(), Some("postgres://localhost/test"));
        assert_eq!(config.migrations.table_name, "schema_log");
    }
}
