//! Table descriptors and structural column diffing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column::Column;
use crate::error::{SchemaError, SchemaResult};
use crate::index::Index;
use crate::model::{ContentType, FieldDef, Model};
use crate::registry::ModelRegistry;
use crate::relation::{Relation, RelationDef, TargetField};
use crate::value::DefaultValue;

/// A table bound to one model.
///
/// Columns are keyed by logical field name and kept with primary key columns
/// first; the relative order of the remaining columns is the declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Owning model.
    pub model: ContentType,
    /// Table name.
    pub name: String,
    /// Columns by logical name.
    pub columns: IndexMap<String, Column>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<Index>,
}

/// An old/new pair for a column whose definition changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChange {
    pub old: Column,
    pub new: Column,
}

/// Result of [`Table::diff`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDiff {
    /// Columns only in the current table.
    pub added: Vec<Column>,
    /// Columns only in the previous table.
    pub removed: Vec<Column>,
    /// Columns in both, with different definitions.
    pub changed: Vec<ColumnChange>,
}

impl TableDiff {
    /// Check if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl Table {
    /// Create an empty table.
    pub fn new(model: ContentType, name: impl Into<String>) -> Self {
        Self {
            model,
            name: name.into(),
            columns: IndexMap::new(),
            indexes: Vec::new(),
        }
    }

    /// Add a column, keeping primary key columns first.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.insert(column.name.clone(), column);
        self.sort_primary_first();
        self
    }

    /// Add an index, naming it after the table if it has no name.
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index.named_for(&self.name));
        self
    }

    fn sort_primary_first(&mut self) {
        // IndexMap::sort_by is stable.
        self.columns.sort_by(|_, a, _, b| b.primary.cmp(&a.primary));
    }

    /// Derive the table of a registered model.
    ///
    /// Only stored fields become columns. Relations are resolved through the
    /// registry and carry a snapshot of the target field.
    pub fn from_model(
        content_type: ContentType,
        model: &dyn Model,
        registry: &ModelRegistry,
    ) -> SchemaResult<Self> {
        let mut table = Self::new(content_type, model.table_name());

        for field in model.field_defs() {
            if !field.use_in_db {
                continue;
            }
            if table.columns.contains_key(&field.name) {
                return Err(SchemaError::Duplicate {
                    kind: "field".to_string(),
                    name: format!("{}.{}", model.model_name(), field.name),
                });
            }

            if let Some(what) = non_finite(&field) {
                return Err(SchemaError::invalid_field(
                    model.model_name(),
                    &field.name,
                    format!("{what} must be a finite number"),
                ));
            }

            let relation = match &field.relation {
                Some(def) => Some(resolve_relation(model.model_name(), &field, def, registry)?),
                None => None,
            };
            let db_type = field
                .db_type
                .or_else(|| {
                    relation
                        .as_ref()
                        .and_then(|r| r.target_field.as_ref())
                        .map(|f| f.db_type)
                })
                .ok_or_else(|| {
                    SchemaError::invalid_field(model.model_name(), &field.name, "no column type")
                })?;

            table
                .columns
                .insert(field.name.clone(), Column::from_field(&field, db_type, relation));
        }
        table.sort_primary_first();

        for index in model.indexes() {
            let index = index.named_for(&table.name);
            if table.indexes.iter().any(|i| i.name == index.name) {
                return Err(SchemaError::Duplicate {
                    kind: "index".to_string(),
                    name: format!("{}.{}", model.model_name(), index.name),
                });
            }
            if let Some(missing) = index.fields.iter().find(|f| !table.columns.contains_key(*f)) {
                return Err(SchemaError::invalid_field(
                    model.model_name(),
                    missing.as_str(),
                    "indexed field is not a stored column",
                ));
            }
            table.indexes.push(index);
        }

        debug!(
            model = %table.model,
            table = %table.name,
            columns = table.columns.len(),
            indexes = table.indexes.len(),
            "Built table"
        );
        Ok(table)
    }

    /// Get a column by logical name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Primary key columns.
    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.values().filter(|c| c.primary).collect()
    }

    /// Columns that reference other tables.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Column> {
        self.columns.values().filter(|c| c.is_foreign_key())
    }

    /// Compare against the previous version of this table by logical column
    /// name. Renamed columns show up as one removal and one addition.
    pub fn diff(&self, previous: &Table) -> TableDiff {
        let mut diff = TableDiff::default();

        for (name, column) in &self.columns {
            match previous.columns.get(name) {
                None => diff.added.push(column.clone()),
                Some(old) if old != column => diff.changed.push(ColumnChange {
                    old: old.clone(),
                    new: column.clone(),
                }),
                Some(_) => {}
            }
        }
        for (name, column) in &previous.columns {
            if !self.columns.contains_key(name) {
                diff.removed.push(column.clone());
            }
        }

        diff
    }
}

/// The first float attribute of a field that JSON cannot store.
fn non_finite(field: &FieldDef) -> Option<&'static str> {
    let bad = |v: Option<f64>| v.is_some_and(|v| !v.is_finite());
    if bad(field.min_value) {
        Some("min_value")
    } else if bad(field.max_value) {
        Some("max_value")
    } else if matches!(field.default, Some(DefaultValue::Float(f)) if !f.is_finite()) {
        Some("default")
    } else {
        None
    }
}

fn resolve_relation(
    model_name: &str,
    field: &FieldDef,
    def: &RelationDef,
    registry: &ModelRegistry,
) -> SchemaResult<Relation> {
    let target = registry.resolve(&def.target, model_name, &field.name)?;
    let target_model = registry
        .get(&target)
        .ok_or_else(|| SchemaError::UnknownModel {
            model: model_name.to_string(),
            field: field.name.clone(),
            reference: target.to_string(),
        })?;
    let target_fields = target_model.field_defs();

    let target_def = match &def.target_field {
        Some(name) => target_fields.iter().find(|f| f.name == name.as_str()),
        None => target_fields.iter().find(|f| f.primary),
    }
    .ok_or_else(|| {
        SchemaError::invalid_relation(
            model_name,
            &field.name,
            format!(
                "target field `{}` not found on `{target}`",
                def.target_field.as_deref().unwrap_or("<primary key>")
            ),
        )
    })?;

    let target_field = if def.is_materialized() {
        let db_type = target_def.db_type.ok_or_else(|| {
            SchemaError::invalid_relation(
                model_name,
                &field.name,
                format!("target field `{target}.{}` has no column type", target_def.name),
            )
        })?;
        Some(TargetField {
            name: target_def.name.clone(),
            column: target_def.column_name(),
            nullable: target_def.nullable,
            db_type,
        })
    } else {
        None
    };

    Ok(Relation {
        kind: def.kind,
        target_table: target_model.table_name(),
        target,
        target_field,
        through: def.through.clone(),
        on_delete: def.on_delete,
        on_update: def.on_update,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelDescriptor;
    use crate::types::{ColumnType, ReferentialAction};
    use pretty_assertions::assert_eq;

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.register(
            "auth",
            ModelDescriptor::new("User")
                .field(FieldDef::string("email", 255).unique())
                .field(FieldDef::id()),
        );
        registry.register(
            "todo",
            ModelDescriptor::new("Todo")
                .field(FieldDef::string("title", 200))
                .field(FieldDef::boolean("done").default_value(false))
                .field(FieldDef::id())
                .field(FieldDef::foreign_key(
                    "User",
                    RelationDef::foreign_key("auth.User")
                        .with_on_delete(ReferentialAction::Cascade),
                ))
                .field(FieldDef::reverse("tags", RelationDef::many_to_many("auth.User")))
                .index(Index::new(["done", "title"])),
        );
        registry
    }

    #[test]
    fn test_from_model_orders_primary_first() {
        let registry = registry();
        let table = registry
            .build_table(&ContentType::new("todo", "Todo"))
            .unwrap()
            .unwrap();

        let names: Vec<_> = table.columns.keys().cloned().collect();
        assert_eq!(names, vec!["id", "title", "done", "User"]);
        assert_eq!(table.name, "todo");
        assert_eq!(table.indexes[0].name, "todo_done_title_idx");
    }

    #[test]
    fn test_from_model_resolves_foreign_key() {
        let registry = registry();
        let table = registry
            .build_table(&ContentType::new("todo", "Todo"))
            .unwrap()
            .unwrap();

        let user = table.get_column("User").unwrap();
        assert_eq!(user.column, "user_id");
        assert_eq!(user.db_type, ColumnType::BigInt);

        let rel = user.relation.as_ref().unwrap();
        assert_eq!(rel.target, ContentType::new("auth", "User"));
        assert_eq!(rel.target_table, "user");
        assert_eq!(rel.target_column(), Some("id"));
        assert_eq!(rel.on_delete, Some(ReferentialAction::Cascade));
        assert!(table.get_column("tags").is_none());
    }

    #[test]
    fn test_unknown_relation_target() {
        let mut registry = ModelRegistry::new();
        registry.register(
            "todo",
            ModelDescriptor::new("Todo")
                .field(FieldDef::id())
                .field(FieldDef::foreign_key("owner", RelationDef::foreign_key("Account"))),
        );
        let err = registry
            .build_table(&ContentType::new("todo", "Todo"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownModel { .. }));
    }

    #[test]
    fn test_index_on_missing_field_is_rejected() {
        let mut registry = ModelRegistry::new();
        registry.register(
            "todo",
            ModelDescriptor::new("Todo")
                .field(FieldDef::id())
                .index(Index::new(["nope"])),
        );
        let err = registry
            .build_table(&ContentType::new("todo", "Todo"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { .. }));
    }

    #[test]
    fn test_duplicate_index_name_is_rejected() {
        let mut registry = ModelRegistry::new();
        registry.register(
            "todo",
            ModelDescriptor::new("Todo")
                .field(FieldDef::id())
                .field(FieldDef::string("title", 200))
                .field(FieldDef::boolean("done"))
                .index(Index::new(["title"]).name("todo_lookup"))
                .index(Index::new(["done"]).name("todo_lookup")),
        );
        let err = registry
            .build_table(&ContentType::new("todo", "Todo"))
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Duplicate { ref kind, ref name } if kind == "index" && name == "Todo.todo_lookup"
        ));
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        let cases = [
            FieldDef::new("limit", ColumnType::Double).default_value(f64::INFINITY),
            FieldDef::new("ratio", ColumnType::Double).default_value(f64::NAN),
            FieldDef::new("score", ColumnType::Double).range(Some(f64::NEG_INFINITY), None),
        ];
        for field in cases {
            let name = field.name.clone();
            let mut registry = ModelRegistry::new();
            registry.register(
                "shop",
                ModelDescriptor::new("Item").field(FieldDef::id()).field(field),
            );
            let err = registry
                .build_table(&ContentType::new("shop", "Item"))
                .unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidField { field: ref f, .. } if *f == name),
                "unexpected error for {name}: {err}"
            );
        }
    }

    #[test]
    fn test_diff_of_identical_tables_is_empty() {
        let registry = registry();
        let table = registry
            .build_table(&ContentType::new("todo", "Todo"))
            .unwrap()
            .unwrap();
        assert!(table.diff(&table).is_empty());
    }

    #[test]
    fn test_diff_is_keyed_by_logical_name() {
        let ct = ContentType::new("blog", "Post");
        let previous = Table::new(ct.clone(), "post")
            .column(Column::new("id", ColumnType::BigInt).primary())
            .column(Column::new("title", ColumnType::VarChar).max_length(100))
            .column(Column::new("body", ColumnType::Text));
        // Same columns in a different order, with one changed, one renamed.
        let current = Table::new(ct, "post")
            .column(Column::new("content", ColumnType::Text))
            .column(Column::new("title", ColumnType::VarChar).max_length(200))
            .column(Column::new("id", ColumnType::BigInt).primary());

        let diff = current.diff(&previous);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "content");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].name, "body");
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].old.max_length, Some(100));
        assert_eq!(diff.changed[0].new.max_length, Some(200));
    }

    #[test]
    fn test_table_equality_ignores_column_order() {
        let ct = ContentType::new("blog", "Post");
        let a = Table::new(ct.clone(), "post")
            .column(Column::new("a", ColumnType::Text))
            .column(Column::new("b", ColumnType::Text));
        let b = Table::new(ct, "post")
            .column(Column::new("b", ColumnType::Text))
            .column(Column::new("a", ColumnType::Text));
        assert_eq!(a, b);
    }
}
