//! Table differ.
//!
//! Compares a model's current table with the table recorded by its last
//! migration and produces the actions that turn one into the other. Actions
//! come out table-level first, then columns, then indexes.

use indexmap::IndexMap;
use tidemark_schema::{Index, Table};

use crate::action::MigrationAction;

/// Computes the actions between two versions of a table.
#[derive(Debug, Clone, Copy)]
pub struct TableDiffer<'a> {
    current: Option<&'a Table>,
    previous: Option<&'a Table>,
}

impl<'a> TableDiffer<'a> {
    /// Create a differ for the current table, or `None` if the model is gone.
    pub fn new(current: Option<&'a Table>) -> Self {
        Self {
            current,
            previous: None,
        }
    }

    /// Set the table recorded by the last migration.
    pub fn with_previous(mut self, previous: Option<&'a Table>) -> Self {
        self.previous = previous;
        self
    }

    /// Compute the actions. An empty list means no migration is needed.
    pub fn diff(&self) -> Vec<MigrationAction> {
        let (current, previous) = match (self.current, self.previous) {
            (None, None) => return Vec::new(),
            (Some(current), None) => {
                return vec![MigrationAction::CreateTable {
                    table: current.clone(),
                }];
            }
            (None, Some(previous)) => {
                return vec![MigrationAction::DropTable {
                    table: previous.clone(),
                }];
            }
            (Some(current), Some(previous)) => (current, previous),
        };

        let mut actions = Vec::new();

        if current.name != previous.name {
            actions.push(MigrationAction::RenameTable {
                old: previous.clone(),
                new: current.clone(),
            });
        }

        let columns = current.diff(previous);
        actions.extend(
            columns
                .added
                .into_iter()
                .map(|field| MigrationAction::AddField { field }),
        );
        actions.extend(
            columns
                .removed
                .into_iter()
                .map(|field| MigrationAction::RemoveField { field }),
        );
        actions.extend(
            columns
                .changed
                .into_iter()
                .map(|c| MigrationAction::AlterField { old: c.old, new: c.new }),
        );

        actions.extend(diff_indexes(&previous.indexes, &current.indexes));
        actions
    }
}

/// Diff two index sets by name.
///
/// Dropped and added indexes that share a definition under different names are
/// paired into a single rename.
fn diff_indexes(old: &[Index], new: &[Index]) -> Vec<MigrationAction> {
    let old_map: IndexMap<&str, &Index> = old.iter().map(|i| (i.name.as_str(), i)).collect();
    let new_map: IndexMap<&str, &Index> = new.iter().map(|i| (i.name.as_str(), i)).collect();

    let mut dropped: Vec<&Index> = old_map
        .iter()
        .filter(|(name, index)| new_map.get(*name) != Some(*index))
        .map(|(_, index)| *index)
        .collect();
    let mut added: Vec<&Index> = new_map
        .iter()
        .filter(|(name, index)| old_map.get(*name) != Some(*index))
        .map(|(_, index)| *index)
        .collect();

    let mut renamed = Vec::new();
    dropped.retain(|old_index| {
        let pair = added
            .iter()
            .position(|a| a.name != old_index.name && a.same_definition(old_index));
        match pair {
            Some(pos) => {
                let new_index = added.remove(pos);
                renamed.push(MigrationAction::RenameIndex {
                    old: (*old_index).clone(),
                    new: new_index.clone(),
                });
                false
            }
            None => true,
        }
    });

    let mut actions: Vec<MigrationAction> = dropped
        .into_iter()
        .map(|index| MigrationAction::DropIndex {
            index: index.clone(),
        })
        .collect();
    actions.extend(renamed);
    actions.extend(added.into_iter().map(|index| MigrationAction::AddIndex {
        index: index.clone(),
    }));
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;
    use pretty_assertions::assert_eq;
    use tidemark_schema::{Column, ColumnType, ContentType, IndexType};

    fn post() -> Table {
        Table::new(ContentType::new("blog", "BlogPost"), "blog_post")
            .column(Column::new("id", ColumnType::BigInt).primary().auto_increment())
            .column(Column::new("title", ColumnType::VarChar).max_length(200))
            .column(Column::new("body", ColumnType::Text))
    }

    fn types(actions: &[MigrationAction]) -> Vec<ActionType> {
        actions.iter().map(MigrationAction::action_type).collect()
    }

    #[test]
    fn test_no_previous_creates_table() {
        let table = post();
        let actions = TableDiffer::new(Some(&table)).diff();
        assert_eq!(types(&actions), vec![ActionType::CreateTable]);
    }

    #[test]
    fn test_no_current_drops_table() {
        let table = post();
        let actions = TableDiffer::new(None).with_previous(Some(&table)).diff();
        assert_eq!(types(&actions), vec![ActionType::DropTable]);
    }

    #[test]
    fn test_identical_tables_need_no_migration() {
        let table = post();
        assert!(TableDiffer::new(Some(&table))
            .with_previous(Some(&table))
            .diff()
            .is_empty());
    }

    #[test]
    fn test_rename_table_then_columns() {
        let previous = post();
        let mut current = post().column(Column::new("summary", ColumnType::Text).nullable());
        current.name = "posts".to_string();
        current.columns.shift_remove("body");

        let actions = TableDiffer::new(Some(&current))
            .with_previous(Some(&previous))
            .diff();
        assert_eq!(
            types(&actions),
            vec![
                ActionType::RenameTable,
                ActionType::AddField,
                ActionType::RemoveField
            ]
        );
    }

    #[test]
    fn test_alter_field_keeps_both_sides() {
        let previous = post();
        let current = post().column(Column::new("title", ColumnType::VarChar).max_length(255));

        let actions = TableDiffer::new(Some(&current))
            .with_previous(Some(&previous))
            .diff();
        match actions.as_slice() {
            [MigrationAction::AlterField { old, new }] => {
                assert_eq!(old.max_length, Some(200));
                assert_eq!(new.max_length, Some(255));
            }
            other => panic!("expected one alter_field, got {other:?}"),
        }
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let previous = post();
        let mut current = Table::new(previous.model.clone(), "blog_post");
        for column in previous.columns.values().rev() {
            current = current.column(column.clone());
        }

        assert!(TableDiffer::new(Some(&current))
            .with_previous(Some(&previous))
            .diff()
            .is_empty());
    }

    #[test]
    fn test_index_rename_is_single_action() {
        let previous = post().index(Index::new(["title", "body"]).name("i1"));
        let current = post().index(Index::new(["title", "body"]).name("i2"));

        let actions = TableDiffer::new(Some(&current))
            .with_previous(Some(&previous))
            .diff();
        match actions.as_slice() {
            [MigrationAction::RenameIndex { old, new }] => {
                assert_eq!(old.name, "i1");
                assert_eq!(new.name, "i2");
            }
            other => panic!("expected one rename_index, got {other:?}"),
        }
    }

    #[test]
    fn test_index_changed_under_same_name() {
        let previous = post().index(Index::new(["title", "body"]).name("i1"));
        let current = post().index(Index::new(["body", "title"]).name("i1"));

        let actions = TableDiffer::new(Some(&current))
            .with_previous(Some(&previous))
            .diff();
        assert_eq!(
            types(&actions),
            vec![ActionType::DropIndex, ActionType::AddIndex]
        );
    }

    #[test]
    fn test_index_rename_only_pairs_same_definition() {
        let previous = post()
            .index(Index::new(["title"]).name("a"))
            .index(Index::new(["body"]).name("b"));
        let current = post()
            .index(Index::new(["title"]).name("a2"))
            .index(Index::new(["body"]).name("b2").index_type(IndexType::Hash));

        let actions = TableDiffer::new(Some(&current))
            .with_previous(Some(&previous))
            .diff();
        assert_eq!(
            types(&actions),
            vec![
                ActionType::DropIndex,
                ActionType::RenameIndex,
                ActionType::AddIndex
            ]
        );
    }

    #[test]
    fn test_index_comment_change_is_not_a_migration() {
        let previous = post().index(Index::new(["title"]).name("a"));
        let current = post().index(Index::new(["title"]).name("a").comment("lookup"));

        assert!(TableDiffer::new(Some(&current))
            .with_previous(Some(&previous))
            .diff()
            .is_empty());
    }
}
