//! The schema editor contract.
//!
//! The engine never emits DDL itself. It sequences calls to a [`SchemaEditor`],
//! one implementation per database engine, which also owns the ledger of
//! applied migrations.

use tidemark_schema::{Column, Index, Table};
use tracing::debug;

use crate::action::MigrationAction;
use crate::error::MigrateResult;

/// Executes schema changes and records applied migrations.
#[async_trait::async_trait]
pub trait SchemaEditor: Send + Sync {
    /// Create the applied-migrations ledger if it does not exist. Idempotent.
    async fn setup(&self) -> MigrateResult<()>;

    /// Check if a migration has been applied.
    async fn has_migration(&self, app: &str, model: &str, name: &str) -> MigrateResult<bool>;

    /// Record a migration as applied.
    async fn store_migration(&self, app: &str, model: &str, name: &str) -> MigrateResult<()>;

    /// Remove a migration from the ledger.
    async fn remove_migration(&self, app: &str, model: &str, name: &str) -> MigrateResult<()>;

    /// Create a table with its columns, foreign keys and indexes.
    async fn create_table(&self, table: &Table) -> MigrateResult<()>;

    /// Drop a table.
    async fn drop_table(&self, table: &Table) -> MigrateResult<()>;

    /// Rename a table.
    async fn rename_table(&self, old: &Table, new: &Table) -> MigrateResult<()>;

    /// Create an index on a table.
    async fn add_index(&self, table: &Table, index: &Index) -> MigrateResult<()>;

    /// Drop an index from a table.
    async fn drop_index(&self, table: &Table, index: &Index) -> MigrateResult<()>;

    /// Rename an index.
    async fn rename_index(&self, table: &Table, old: &Index, new: &Index) -> MigrateResult<()>;

    /// Add a column to a table.
    async fn add_field(&self, table: &Table, column: &Column) -> MigrateResult<()>;

    /// Change a column from `old` to `new`.
    async fn alter_field(&self, table: &Table, old: &Column, new: &Column) -> MigrateResult<()>;

    /// Remove a column from a table.
    async fn remove_field(&self, table: &Table, column: &Column) -> MigrateResult<()>;
}

/// Dispatch one action to the editor.
///
/// `table` is the snapshot stored in the migration the action belongs to.
pub async fn apply_action<E>(editor: &E, table: &Table, action: &MigrationAction) -> MigrateResult<()>
where
    E: SchemaEditor + ?Sized,
{
    debug!(table = %table.name, action = %action.describe(), "Applying action");
    match action {
        MigrationAction::CreateTable { table } => editor.create_table(table).await,
        MigrationAction::DropTable { table } => editor.drop_table(table).await,
        MigrationAction::RenameTable { old, new } => editor.rename_table(old, new).await,
        MigrationAction::AddField { field } => editor.add_field(table, field).await,
        MigrationAction::AlterField { old, new } => editor.alter_field(table, old, new).await,
        MigrationAction::RemoveField { field } => editor.remove_field(table, field).await,
        MigrationAction::AddIndex { index } => editor.add_index(table, index).await,
        MigrationAction::DropIndex { index } => editor.drop_index(table, index).await,
        MigrationAction::RenameIndex { old, new } => editor.rename_index(table, old, new).await,
    }
}
