//! Migration actions.
//!
//! In memory an action is a [`MigrationAction`] sum type, so every consumer
//! matches exhaustively. On disk it is stored as
//! `{"action": "<type>", "table"?: {old?, new?}, "field"?: {..}, "index"?: {..}}`.

use serde::{Deserialize, Serialize};
use tidemark_schema::{Column, Index, Table};

use crate::error::MigrationError;

/// The kind of a migration action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Create a table.
    CreateTable,
    /// Drop a table.
    DropTable,
    /// Rename a table.
    RenameTable,
    /// Add a column.
    AddField,
    /// Change a column.
    AlterField,
    /// Remove a column.
    RemoveField,
    /// Create an index.
    AddIndex,
    /// Drop an index.
    DropIndex,
    /// Rename an index.
    RenameIndex,
}

impl ActionType {
    /// All action types.
    pub const ALL: [ActionType; 9] = [
        Self::CreateTable,
        Self::DropTable,
        Self::RenameTable,
        Self::AddField,
        Self::AlterField,
        Self::RemoveField,
        Self::AddIndex,
        Self::DropIndex,
        Self::RenameIndex,
    ];

    /// Serialized name, also used as the verb in migration file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTable => "create_table",
            Self::DropTable => "drop_table",
            Self::RenameTable => "rename_table",
            Self::AddField => "add_field",
            Self::AlterField => "alter_field",
            Self::RemoveField => "remove_field",
            Self::AddIndex => "add_index",
            Self::DropIndex => "drop_index",
            Self::RenameIndex => "rename_index",
        }
    }

    /// Parse a serialized name.
    pub fn parse(s: &str) -> Result<Self, MigrationError> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MigrationError::UnknownAction(s.to_string()))
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub enum MigrationAction {
    /// Create a table with its columns and indexes.
    CreateTable {
        /// Table to create.
        table: Table,
    },
    /// Drop a table.
    DropTable {
        /// Table as it was before the drop.
        table: Table,
    },
    /// Rename a table.
    RenameTable {
        /// Table before the rename.
        old: Table,
        /// Table after the rename.
        new: Table,
    },
    /// Add a column.
    AddField {
        /// Column to add.
        field: Column,
    },
    /// Change a column in place.
    AlterField {
        /// Column before the change.
        old: Column,
        /// Column after the change.
        new: Column,
    },
    /// Remove a column.
    RemoveField {
        /// Column as it was before removal.
        field: Column,
    },
    /// Create an index.
    AddIndex {
        /// Index to create.
        index: Index,
    },
    /// Drop an index.
    DropIndex {
        /// Index as it was before the drop.
        index: Index,
    },
    /// Rename an index with an unchanged definition.
    RenameIndex {
        /// Index before the rename.
        old: Index,
        /// Index after the rename.
        new: Index,
    },
}

impl MigrationAction {
    /// The action's type.
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::CreateTable { .. } => ActionType::CreateTable,
            Self::DropTable { .. } => ActionType::DropTable,
            Self::RenameTable { .. } => ActionType::RenameTable,
            Self::AddField { .. } => ActionType::AddField,
            Self::AlterField { .. } => ActionType::AlterField,
            Self::RemoveField { .. } => ActionType::RemoveField,
            Self::AddIndex { .. } => ActionType::AddIndex,
            Self::DropIndex { .. } => ActionType::DropIndex,
            Self::RenameIndex { .. } => ActionType::RenameIndex,
        }
    }

    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { table } => format!("create table {}", table.name),
            Self::DropTable { table } => format!("drop table {}", table.name),
            Self::RenameTable { old, new } => format!("rename table {} to {}", old.name, new.name),
            Self::AddField { field } => format!("add field {}", field.name),
            Self::AlterField { new, .. } => format!("alter field {}", new.name),
            Self::RemoveField { field } => format!("remove field {}", field.name),
            Self::AddIndex { index } => format!("add index {}", index.name),
            Self::DropIndex { index } => format!("drop index {}", index.name),
            Self::RenameIndex { old, new } => format!("rename index {} to {}", old.name, new.name),
        }
    }
}

/// An old/new pair as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change<T> {
    /// State before the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<T>,
    /// State after the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<T>,
}

impl<T> Change<T> {
    fn removed(old: T) -> Option<Self> {
        Some(Self {
            old: Some(old),
            new: None,
        })
    }

    fn added(new: T) -> Option<Self> {
        Some(Self {
            old: None,
            new: Some(new),
        })
    }

    fn changed(old: T, new: T) -> Option<Self> {
        Some(Self {
            old: Some(old),
            new: Some(new),
        })
    }
}

/// The on-disk shape of an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAction {
    /// Action type name.
    pub action: String,
    /// Table change, for table actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Change<Table>>,
    /// Column change, for field actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Change<Column>>,
    /// Index change, for index actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<Change<Index>>,
}

impl From<MigrationAction> for RawAction {
    fn from(action: MigrationAction) -> Self {
        let mut raw = RawAction {
            action: action.action_type().as_str().to_string(),
            table: None,
            field: None,
            index: None,
        };
        match action {
            MigrationAction::CreateTable { table } => raw.table = Change::added(table),
            MigrationAction::DropTable { table } => raw.table = Change::removed(table),
            MigrationAction::RenameTable { old, new } => raw.table = Change::changed(old, new),
            MigrationAction::AddField { field } => raw.field = Change::added(field),
            MigrationAction::AlterField { old, new } => raw.field = Change::changed(old, new),
            MigrationAction::RemoveField { field } => raw.field = Change::removed(field),
            MigrationAction::AddIndex { index } => raw.index = Change::added(index),
            MigrationAction::DropIndex { index } => raw.index = Change::removed(index),
            MigrationAction::RenameIndex { old, new } => raw.index = Change::changed(old, new),
        }
        raw
    }
}

fn side<T>(
    change: &mut Option<Change<T>>,
    action: ActionType,
    key: &str,
    old: bool,
) -> Result<T, MigrationError> {
    let value = change
        .as_mut()
        .and_then(|c| if old { c.old.take() } else { c.new.take() });
    value.ok_or_else(|| {
        MigrationError::invalid_migration(format!(
            "{action} action is missing `{key}.{}`",
            if old { "old" } else { "new" }
        ))
    })
}

impl TryFrom<RawAction> for MigrationAction {
    type Error = MigrationError;

    fn try_from(mut raw: RawAction) -> Result<Self, Self::Error> {
        let ty = ActionType::parse(&raw.action)?;
        let (t, f, i) = (&mut raw.table, &mut raw.field, &mut raw.index);
        Ok(match ty {
            ActionType::CreateTable => Self::CreateTable {
                table: side(t, ty, "table", false)?,
            },
            ActionType::DropTable => Self::DropTable {
                table: side(t, ty, "table", true)?,
            },
            ActionType::RenameTable => Self::RenameTable {
                old: side(t, ty, "table", true)?,
                new: side(t, ty, "table", false)?,
            },
            ActionType::AddField => Self::AddField {
                field: side(f, ty, "field", false)?,
            },
            ActionType::AlterField => Self::AlterField {
                old: side(f, ty, "field", true)?,
                new: side(f, ty, "field", false)?,
            },
            ActionType::RemoveField => Self::RemoveField {
                field: side(f, ty, "field", true)?,
            },
            ActionType::AddIndex => Self::AddIndex {
                index: side(i, ty, "index", false)?,
            },
            ActionType::DropIndex => Self::DropIndex {
                index: side(i, ty, "index", true)?,
            },
            ActionType::RenameIndex => Self::RenameIndex {
                old: side(i, ty, "index", true)?,
                new: side(i, ty, "index", false)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tidemark_schema::ColumnType;

    #[test]
    fn test_action_type_names() {
        for ty in ActionType::ALL {
            assert_eq!(ActionType::parse(ty.as_str()).unwrap(), ty);
        }
        assert!(matches!(
            ActionType::parse("truncate_table"),
            Err(MigrationError::UnknownAction(name)) if name == "truncate_table"
        ));
    }

    #[test]
    fn test_add_field_on_disk_shape() {
        let action = MigrationAction::AddField {
            field: Column::new("bio", ColumnType::Text).nullable(),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["action"], "add_field");
        assert!(value["field"]["new"].is_object());
        assert!(value["field"].get("old").is_none());
        assert!(value.get("table").is_none());
    }

    #[test]
    fn test_rename_index_decodes() {
        let value = json!({
            "action": "rename_index",
            "index": {
                "old": {"name": "i1", "fields": ["x", "y"]},
                "new": {"name": "i2", "fields": ["x", "y"]}
            }
        });
        let action: MigrationAction = serde_json::from_value(value).unwrap();
        match action {
            MigrationAction::RenameIndex { old, new } => {
                assert_eq!(old.name, "i1");
                assert_eq!(new.name, "i2");
                assert!(old.same_definition(&new));
            }
            other => panic!("expected rename_index, got {other:?}"),
        }
    }

    #[test]
    fn test_one_sided_change_decodes() {
        let action = MigrationAction::AddField {
            field: Column::new("bio", ColumnType::Text).nullable(),
        };
        let encoded = serde_json::to_string(&action).unwrap();
        let decoded: MigrationAction = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let value = json!({"action": "explode"});
        let err = serde_json::from_value::<MigrationAction>(value).unwrap_err();
        assert!(err.to_string().contains("Unknown action type 'explode'"));
    }

    #[test]
    fn test_missing_side_is_rejected() {
        let value = json!({"action": "alter_field", "field": {"new": {
            "name": "bio", "column": "bio", "rust_type": "String", "db_type": "text"
        }}});
        let err = serde_json::from_value::<MigrationAction>(value).unwrap_err();
        assert!(err.to_string().contains("field.old"));
    }
}
