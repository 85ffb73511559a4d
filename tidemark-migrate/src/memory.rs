//! An in-memory [`SchemaEditor`].
//!
//! Keeps the applied ledger and the live table set in memory and records every
//! call, which makes it suitable for tests and for previewing a migration run.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use tidemark_schema::{Column, Index, Table};

use crate::editor::SchemaEditor;
use crate::error::{MigrateResult, MigrationError};

#[derive(Debug, Default)]
struct State {
    ledger: BTreeSet<String>,
    tables: BTreeMap<String, Table>,
    calls: Vec<String>,
    setups: usize,
}

/// In-memory schema editor.
#[derive(Debug, Default)]
pub struct MemoryEditor {
    state: Mutex<State>,
    fail_on: Option<String>,
}

impl MemoryEditor {
    /// Create an empty editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call whose log line starts with `prefix` fail.
    pub fn fail_on(mut self, prefix: impl Into<String>) -> Self {
        self.fail_on = Some(prefix.into());
        self
    }

    /// Mark a migration as applied without running it.
    pub fn with_applied(self, app: &str, model: &str, name: &str) -> Self {
        self.state.lock().ledger.insert(ledger_key(app, model, name));
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Applied migration keys, sorted.
    pub fn applied(&self) -> Vec<String> {
        self.state.lock().ledger.iter().cloned().collect()
    }

    /// Current state of a table, by table name.
    pub fn table(&self, name: &str) -> Option<Table> {
        self.state.lock().tables.get(name).cloned()
    }

    /// Number of times `setup` ran.
    pub fn setup_count(&self) -> usize {
        self.state.lock().setups
    }

    fn record(&self, call: String, apply: impl FnOnce(&mut State)) -> MigrateResult<()> {
        if self.fail_on.as_deref().is_some_and(|p| call.starts_with(p)) {
            return Err(MigrationError::editor(format!("{call} failed")));
        }
        let mut state = self.state.lock();
        apply(&mut *state);
        state.calls.push(call);
        Ok(())
    }

    fn with_table(&self, call: String, name: &str, apply: impl FnOnce(&mut Table)) -> MigrateResult<()> {
        if !self.state.lock().tables.contains_key(name) {
            return Err(MigrationError::editor(format!("{call}: table `{name}` does not exist")));
        }
        self.record(call, |state| {
            if let Some(table) = state.tables.get_mut(name) {
                apply(table);
            }
        })
    }
}

fn ledger_key(app: &str, model: &str, name: &str) -> String {
    format!("{app}:{model}:{name}")
}

#[async_trait::async_trait]
impl SchemaEditor for MemoryEditor {
    async fn setup(&self) -> MigrateResult<()> {
        self.state.lock().setups += 1;
        Ok(())
    }

    async fn has_migration(&self, app: &str, model: &str, name: &str) -> MigrateResult<bool> {
        Ok(self.state.lock().ledger.contains(&ledger_key(app, model, name)))
    }

    async fn store_migration(&self, app: &str, model: &str, name: &str) -> MigrateResult<()> {
        let key = ledger_key(app, model, name);
        self.record(format!("store_migration {key}"), |state| {
            state.ledger.insert(key);
        })
    }

    async fn remove_migration(&self, app: &str, model: &str, name: &str) -> MigrateResult<()> {
        let key = ledger_key(app, model, name);
        self.record(format!("remove_migration {key}"), |state| {
            state.ledger.remove(&key);
        })
    }

    async fn create_table(&self, table: &Table) -> MigrateResult<()> {
        let call = format!("create_table {}", table.name);
        if self.state.lock().tables.contains_key(&table.name) {
            return Err(MigrationError::editor(format!("{call}: table already exists")));
        }
        self.record(call, |state| {
            state.tables.insert(table.name.clone(), table.clone());
        })
    }

    async fn drop_table(&self, table: &Table) -> MigrateResult<()> {
        let call = format!("drop_table {}", table.name);
        self.with_table(call, &table.name, |_| {})?;
        self.state.lock().tables.remove(&table.name);
        Ok(())
    }

    async fn rename_table(&self, old: &Table, new: &Table) -> MigrateResult<()> {
        let call = format!("rename_table {} {}", old.name, new.name);
        self.with_table(call, &old.name, |_| {})?;
        let mut state = self.state.lock();
        if let Some(mut table) = state.tables.remove(&old.name) {
            table.name = new.name.clone();
            state.tables.insert(new.name.clone(), table);
        }
        Ok(())
    }

    async fn add_index(&self, table: &Table, index: &Index) -> MigrateResult<()> {
        let call = format!("add_index {}.{}", table.name, index.name);
        self.with_table(call, &table.name, |t| t.indexes.push(index.clone()))
    }

    async fn drop_index(&self, table: &Table, index: &Index) -> MigrateResult<()> {
        let call = format!("drop_index {}.{}", table.name, index.name);
        self.with_table(call, &table.name, |t| t.indexes.retain(|i| i.name != index.name))
    }

    async fn rename_index(&self, table: &Table, old: &Index, new: &Index) -> MigrateResult<()> {
        let call = format!("rename_index {}.{} {}", table.name, old.name, new.name);
        self.with_table(call, &table.name, |t| {
            for index in t.indexes.iter_mut().filter(|i| i.name == old.name) {
                index.name = new.name.clone();
            }
        })
    }

    async fn add_field(&self, table: &Table, column: &Column) -> MigrateResult<()> {
        let call = format!("add_field {}.{}", table.name, column.name);
        self.with_table(call, &table.name, |t| {
            t.columns.insert(column.name.clone(), column.clone());
        })
    }

    async fn alter_field(&self, table: &Table, old: &Column, new: &Column) -> MigrateResult<()> {
        let call = format!("alter_field {}.{}", table.name, new.name);
        self.with_table(call, &table.name, |t| {
            if let Some(column) = t.columns.get_mut(&old.name) {
                *column = new.clone();
            }
        })
    }

    async fn remove_field(&self, table: &Table, column: &Column) -> MigrateResult<()> {
        let call = format!("remove_field {}.{}", table.name, column.name);
        self.with_table(call, &table.name, |t| {
            t.columns.shift_remove(&column.name);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_schema::{ColumnType, ContentType};

    fn user() -> Table {
        Table::new(ContentType::new("auth", "User"), "user")
            .column(Column::new("id", ColumnType::BigInt).primary())
    }

    #[tokio::test]
    async fn test_ledger() {
        let editor = MemoryEditor::new().with_applied("auth", "User", "0001_create_table");
        assert!(editor.has_migration("auth", "User", "0001_create_table").await.unwrap());
        assert!(!editor.has_migration("auth", "User", "0002_add_field").await.unwrap());

        editor.store_migration("auth", "User", "0002_add_field").await.unwrap();
        editor.remove_migration("auth", "User", "0001_create_table").await.unwrap();
        assert_eq!(editor.applied(), vec!["auth:User:0002_add_field"]);
    }

    #[tokio::test]
    async fn test_tracks_table_state() {
        let editor = MemoryEditor::new();
        let table = user();
        editor.create_table(&table).await.unwrap();
        editor
            .add_field(&table, &Column::new("bio", ColumnType::Text))
            .await
            .unwrap();
        editor.rename_table(&table, &Table::new(table.model.clone(), "users")).await.unwrap();

        let live = editor.table("users").unwrap();
        assert!(live.get_column("bio").is_some());
        assert!(editor.table("user").is_none());
    }

    #[tokio::test]
    async fn test_missing_table_and_failures() {
        let editor = MemoryEditor::new();
        let err = editor
            .add_field(&user(), &Column::new("bio", ColumnType::Text))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Editor(_)));

        let editor = MemoryEditor::new().fail_on("create_table user");
        assert!(editor.create_table(&user()).await.is_err());
        assert!(editor.calls().is_empty());
    }
}
