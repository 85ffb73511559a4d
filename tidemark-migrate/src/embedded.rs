//! Migrations compiled into the binary.
//!
//! ```rust,ignore
//! let embedded = EmbeddedMigrations::new("auth")
//!     .add("User/0001_create_table.mig", include_str!("../migrations/auth/User/0001_create_table.mig"));
//! let engine = MigrationEngine::new(config, editor, registry).with_embedded(embedded);
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{MigrateResult, MigrationError};
use crate::file::MigrationFile;

/// A read-only set of migration files for one app.
#[derive(Debug, Clone)]
pub struct EmbeddedMigrations {
    app: String,
    files: Vec<(String, Cow<'static, str>)>,
}

impl EmbeddedMigrations {
    /// Create an empty set for an app.
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            files: Vec::new(),
        }
    }

    /// Add a file at `<Model>/<NNNN_description>.mig`, relative to the app.
    pub fn add(mut self, path: impl Into<String>, contents: impl Into<Cow<'static, str>>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }

    /// App name.
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Decode every file.
    pub fn load(&self) -> MigrateResult<Vec<MigrationFile>> {
        self.files
            .iter()
            .map(|(path, contents)| {
                let (model, file_name) = path
                    .split_once('/')
                    .filter(|(model, file)| !model.is_empty() && !file.contains('/'))
                    .ok_or_else(|| MigrationError::InvalidFileName(path.clone()))?;
                let full: PathBuf = Path::new("<embedded>").join(&self.app).join(path);
                MigrationFile::from_json(&self.app, model, file_name, contents, &full)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::MigrationAction;
    use tidemark_schema::{Column, ColumnType, ContentType, Table};

    fn user_json() -> String {
        let table = Table::new(ContentType::new("auth", "User"), "user")
            .column(Column::new("id", ColumnType::BigInt).primary());
        MigrationFile::new(
            table.model.clone(),
            1,
            table.clone(),
            vec![MigrationAction::CreateTable { table }],
        )
        .to_json()
        .unwrap()
    }

    #[test]
    fn test_load() {
        let embedded = EmbeddedMigrations::new("auth").add("User/0001_create_table.mig", user_json());
        let files = embedded.load().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].key(), "auth:User:0001_create_table");
        assert_eq!(files[0].order, 1);
    }

    #[test]
    fn test_bad_relative_path() {
        let embedded = EmbeddedMigrations::new("auth").add("0001_create_table.mig", user_json());
        assert!(matches!(
            embedded.load(),
            Err(MigrationError::InvalidFileName(_))
        ));
    }
}
