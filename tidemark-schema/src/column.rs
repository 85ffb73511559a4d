//! Column descriptors.

use serde::{Deserialize, Serialize};

use crate::model::{FieldDef, to_snake_case};
use crate::relation::Relation;
use crate::types::ColumnType;
use crate::value::DefaultValue;

/// One column of a [`Table`](crate::Table).
///
/// Equality is structural over every attribute, including the relation target
/// snapshot and the default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Logical field name.
    pub name: String,
    /// Physical column name.
    pub column: String,
    /// Host type tag.
    pub rust_type: String,
    /// Database type.
    pub db_type: ColumnType,
    /// Whether the column accepts NULL.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Whether the database generates the value.
    #[serde(default)]
    pub auto_increment: bool,
    /// Whether values must be unique.
    #[serde(default)]
    pub unique: bool,
    /// Minimum string length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    /// Maximum string length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Minimum numeric value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Maximum numeric value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Total digits of a decimal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Digits after the decimal point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Default value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Resolved relation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
    /// Whether the column is physically stored.
    #[serde(default = "default_true")]
    pub use_in_db: bool,
}

fn default_true() -> bool {
    true
}

impl Column {
    /// Create a new column with defaults derived from the name and type.
    pub fn new(name: impl Into<String>, db_type: ColumnType) -> Self {
        let name = name.into();
        Self {
            column: to_snake_case(&name),
            name,
            rust_type: db_type.rust_type().to_string(),
            db_type,
            nullable: false,
            primary: false,
            auto_increment: false,
            unique: false,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            precision: None,
            scale: None,
            default: None,
            relation: None,
            use_in_db: true,
        }
    }

    /// Build a column from a field definition whose type and relation have
    /// already been resolved.
    pub fn from_field(field: &FieldDef, db_type: ColumnType, relation: Option<Relation>) -> Self {
        Self {
            name: field.name.clone(),
            column: field.column_name(),
            rust_type: field
                .rust_type
                .clone()
                .unwrap_or_else(|| db_type.rust_type().to_string()),
            db_type,
            nullable: field.nullable,
            primary: field.primary,
            auto_increment: field.auto_increment,
            unique: field.unique,
            min_length: field.min_length,
            max_length: field.max_length,
            min_value: field.min_value,
            max_value: field.max_value,
            precision: field.precision,
            scale: field.scale,
            default: field.default.clone(),
            relation,
            use_in_db: field.use_in_db,
        }
    }

    /// Set the physical column name.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Mark as primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Mark as auto-incrementing.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Mark as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the maximum length.
    pub fn max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attach a resolved relation.
    pub fn relation(mut self, relation: Relation) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Check if this column references another table.
    pub fn is_foreign_key(&self) -> bool {
        self.relation.as_ref().is_some_and(|r| r.is_materialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentType;
    use crate::relation::{RelationType, TargetField};
    use chrono::DateTime;

    fn user_fk() -> Relation {
        Relation {
            kind: RelationType::ManyToOne,
            target: ContentType::new("auth", "User"),
            target_table: "user".to_string(),
            target_field: Some(TargetField {
                name: "id".to_string(),
                column: "id".to_string(),
                nullable: false,
                db_type: ColumnType::BigInt,
            }),
            through: None,
            on_delete: None,
            on_update: None,
        }
    }

    #[test]
    fn test_new_derives_column_and_rust_type() {
        let col = Column::new("createdAt", ColumnType::DateTime);
        assert_eq!(col.column, "created_at");
        assert_eq!(col.rust_type, "chrono::DateTime<chrono::Utc>");
        assert!(col.use_in_db);
    }

    #[test]
    fn test_equality_covers_relation_target() {
        let a = Column::new("user", ColumnType::BigInt)
            .column("user_id")
            .relation(user_fk());
        let mut b = a.clone();
        assert_eq!(a, b);

        if let Some(rel) = b.relation.as_mut() {
            rel.target = ContentType::new("legacy", "User");
        }
        assert_ne!(a, b);

        let mut c = a.clone();
        if let Some(field) = c.relation.as_mut().and_then(|r| r.target_field.as_mut()) {
            field.nullable = true;
        }
        assert_ne!(a, c);
    }

    #[test]
    fn test_equality_covers_default() {
        let a = Column::new("active", ColumnType::Boolean).default_value(true);
        let b = Column::new("active", ColumnType::Boolean).default_value(false);
        let c = Column::new("active", ColumnType::Boolean);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_serde_round_trip_keeps_timestamp_default() {
        let ts = DateTime::parse_from_rfc3339("2024-01-01T00:00:00+02:00").unwrap();
        let col = Column::new("published", ColumnType::DateTime)
            .nullable()
            .default_value(ts);
        let json = serde_json::to_string(&col).unwrap();
        let back: Column = serde_json::from_str(&json).unwrap();
        assert_eq!(back, col);
    }

    #[test]
    fn test_is_foreign_key() {
        let col = Column::new("user", ColumnType::BigInt).relation(user_fk());
        assert!(col.is_foreign_key());
        assert!(!Column::new("title", ColumnType::Text).is_foreign_key());
    }
}
