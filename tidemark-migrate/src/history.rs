//! In-memory migration history, rebuilt from the migration sources on every
//! engine call.

use std::collections::BTreeMap;

use tidemark_schema::{ContentType, Table};

use crate::error::{MigrateResult, MigrationError};
use crate::file::MigrationFile;

/// All known migrations, grouped by app and model and sorted by order.
#[derive(Debug, Clone, Default)]
pub struct MigrationHistory {
    migrations: BTreeMap<String, BTreeMap<String, Vec<MigrationFile>>>,
}

impl MigrationHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from a list of migration files.
    pub fn from_files(files: impl IntoIterator<Item = MigrationFile>) -> MigrateResult<Self> {
        let mut history = Self::new();
        for file in files {
            history.insert(file)?;
        }
        Ok(history)
    }

    /// Insert a migration, keeping the model's list sorted by order.
    ///
    /// Two migrations of the same model with the same order conflict.
    pub fn insert(&mut self, file: MigrationFile) -> MigrateResult<()> {
        let list = self
            .migrations
            .entry(file.app.clone())
            .or_default()
            .entry(file.model.clone())
            .or_default();

        match list.binary_search_by_key(&file.order, |m| m.order) {
            Ok(pos) => Err(MigrationError::migration_conflict(
                list[pos].key(),
                file.key(),
            )),
            Err(pos) => {
                list.insert(pos, file);
                Ok(())
            }
        }
    }

    /// Migrations of one model, in order.
    pub fn for_model(&self, app: &str, model: &str) -> &[MigrationFile] {
        self.migrations
            .get(app)
            .and_then(|models| models.get(model))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The most recent migration of a model.
    pub fn last(&self, app: &str, model: &str) -> Option<&MigrationFile> {
        self.for_model(app, model).last()
    }

    /// The table as of the most recent migration, or `None` when the model has
    /// no migrations or its table was dropped.
    pub fn last_table(&self, app: &str, model: &str) -> Option<&Table> {
        self.last(app, model)
            .filter(|m| !m.is_drop())
            .map(|m| &m.table)
    }

    /// Order number for the next migration of a model.
    pub fn next_order(&self, app: &str, model: &str) -> u32 {
        self.last(app, model).map_or(1, |m| m.order + 1)
    }

    /// Every model with at least one migration.
    pub fn content_types(&self) -> Vec<ContentType> {
        self.migrations
            .iter()
            .flat_map(|(app, models)| {
                models
                    .keys()
                    .map(move |model| ContentType::new(app.as_str(), model.as_str()))
            })
            .collect()
    }

    /// Every migration, app by app, model by model, in order.
    pub fn iter(&self) -> impl Iterator<Item = &MigrationFile> {
        self.migrations
            .values()
            .flat_map(|models| models.values())
            .flatten()
    }

    /// Number of migrations.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Check if there are no migrations.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
