//! Error types for the migration engine.

use std::path::PathBuf;

use thiserror::Error;
use tidemark_schema::SchemaError;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration file could not be decoded.
    #[error("Failed to parse migration {path}: {source}")]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A migration could not be encoded.
    #[error("Failed to serialize migration: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A migration file with the same name already exists.
    #[error("Migration file {0} already exists")]
    AlreadyExists(PathBuf),

    /// A declared dependency is neither pending nor applied.
    #[error("Migration '{migration}' depends on '{dependency}', which cannot be found")]
    UnresolvedDependency {
        /// Key of the migration declaring the dependency.
        migration: String,
        /// Key of the missing dependency.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("Cyclic dependency detected at migration '{0}'")]
    CyclicDependency(String),

    /// Unknown action type in a migration file.
    #[error("Unknown action type '{0}'")]
    UnknownAction(String),

    /// Invalid migration file name.
    #[error("Invalid migration file name '{0}': expected NNNN_description.mig")]
    InvalidFileName(String),

    /// Invalid dependency string.
    #[error("Invalid dependency '{0}': expected app:model:migration")]
    InvalidDependency(String),

    /// Invalid migration file content.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Two migrations of the same model share an order number.
    #[error("Migration conflict: migrations '{0}' and '{1}' conflict")]
    MigrationConflict(String, String),

    /// Deriving a table from a model failed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The schema editor failed to apply an action.
    #[error("Schema editor error: {0}")]
    Editor(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MigrationError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a schema editor error.
    pub fn editor(msg: impl Into<String>) -> Self {
        Self::Editor(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create a migration conflict error.
    pub fn migration_conflict(m1: impl Into<String>, m2: impl Into<String>) -> Self {
        Self::MigrationConflict(m1.into(), m2.into())
    }

    /// Check if this error comes from resolving the dependency graph.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedDependency { .. } | Self::CyclicDependency(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::CyclicDependency("auth:User:0001_create_table".to_string());
        assert!(err.to_string().contains("auth:User:0001_create_table"));

        let err = MigrationError::UnresolvedDependency {
            migration: "todo:Todo:0001_create_table".to_string(),
            dependency: "auth:User:0003_add_field".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("todo:Todo:0001_create_table"));
        assert!(msg.contains("auth:User:0003_add_field"));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = MigrationError::io(
            "migrations/auth/User",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("migrations/auth/User"));
    }

    #[test]
    fn test_is_resolution_error() {
        assert!(MigrationError::CyclicDependency("x".into()).is_resolution_error());
        assert!(!MigrationError::editor("boom").is_resolution_error());
        assert!(!MigrationError::UnknownAction("explode".into()).is_resolution_error());
    }

    #[test]
    fn test_schema_error_converts() {
        let err: MigrationError = SchemaError::InvalidContentType("nope".into()).into();
        assert!(matches!(err, MigrationError::Schema(_)));
    }
}
