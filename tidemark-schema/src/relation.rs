//! Relations between models.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::model::ContentType;
use crate::types::{ColumnType, ReferentialAction};

/// The kind of relation a field declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Many rows of this model point at one row of the target (a foreign key).
    ManyToOne,
    /// One-to-one relation.
    OneToOne,
    /// Reverse side of a foreign key.
    OneToMany,
    /// Many-to-many relation.
    ManyToMany,
}

impl RelationType {
    /// Check if this is a "to-one" relation.
    pub fn is_to_one(&self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }

    /// Check if this is a "to-many" relation.
    pub fn is_to_many(&self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Whether a relation of this kind is stored as a physical column.
    pub fn is_materialized(&self, has_through: bool) -> bool {
        match self {
            Self::ManyToOne => true,
            Self::OneToOne => !has_through,
            Self::OneToMany | Self::ManyToMany => false,
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ManyToOne => write!(f, "n:1"),
            Self::OneToOne => write!(f, "1:1"),
            Self::OneToMany => write!(f, "1:n"),
            Self::ManyToMany => write!(f, "m:n"),
        }
    }
}

/// A reference to the target of a relation.
///
/// Models frequently refer to each other before both are registered, so a
/// field may name its target by key (`"auth.User"` or just `"User"`) and let
/// the registry resolve it when the table is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelRef {
    /// Already resolved identity.
    ContentType(ContentType),
    /// Key resolved lazily through the model registry.
    Lazy(SmolStr),
}

impl From<ContentType> for ModelRef {
    fn from(ct: ContentType) -> Self {
        Self::ContentType(ct)
    }
}

impl From<&str> for ModelRef {
    fn from(key: &str) -> Self {
        Self::Lazy(key.into())
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContentType(ct) => write!(f, "{ct}"),
            Self::Lazy(key) => write!(f, "{key}"),
        }
    }
}

/// Junction model of a relation that goes through a separate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Through {
    /// Junction model key.
    pub model: SmolStr,
    /// Field on the junction model pointing at the source model.
    pub source_field: SmolStr,
    /// Field on the junction model pointing at the target model.
    pub target_field: SmolStr,
}

impl Through {
    /// Create a new junction descriptor.
    pub fn new(
        model: impl Into<SmolStr>,
        source_field: impl Into<SmolStr>,
        target_field: impl Into<SmolStr>,
    ) -> Self {
        Self {
            model: model.into(),
            source_field: source_field.into(),
            target_field: target_field.into(),
        }
    }
}

/// A relation as declared on a field, before its target is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    /// Relation kind.
    pub kind: RelationType,
    /// Target model.
    pub target: ModelRef,
    /// Target field; the target's primary key when absent.
    pub target_field: Option<SmolStr>,
    /// Junction model, if any.
    pub through: Option<Through>,
    /// On delete action.
    pub on_delete: Option<ReferentialAction>,
    /// On update action.
    pub on_update: Option<ReferentialAction>,
}

impl RelationDef {
    /// Create a new relation definition.
    pub fn new(kind: RelationType, target: impl Into<ModelRef>) -> Self {
        Self {
            kind,
            target: target.into(),
            target_field: None,
            through: None,
            on_delete: None,
            on_update: None,
        }
    }

    /// A foreign key (many-to-one) relation.
    pub fn foreign_key(target: impl Into<ModelRef>) -> Self {
        Self::new(RelationType::ManyToOne, target)
    }

    /// A one-to-one relation.
    pub fn one_to_one(target: impl Into<ModelRef>) -> Self {
        Self::new(RelationType::OneToOne, target)
    }

    /// A reverse one-to-many relation.
    pub fn one_to_many(target: impl Into<ModelRef>) -> Self {
        Self::new(RelationType::OneToMany, target)
    }

    /// A many-to-many relation.
    pub fn many_to_many(target: impl Into<ModelRef>) -> Self {
        Self::new(RelationType::ManyToMany, target)
    }

    /// Set the target field.
    pub fn with_target_field(mut self, field: impl Into<SmolStr>) -> Self {
        self.target_field = Some(field.into());
        self
    }

    /// Set the junction model.
    pub fn with_through(mut self, through: Through) -> Self {
        self.through = Some(through);
        self
    }

    /// Set the on delete action.
    pub fn with_on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Set the on update action.
    pub fn with_on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// Whether a field with this relation is stored as a physical column.
    ///
    /// Many-to-many and one-to-many relations never are; neither is a
    /// one-to-one relation that goes through a junction table.
    pub fn is_materialized(&self) -> bool {
        self.kind.is_materialized(self.through.is_some())
    }
}

/// Snapshot of the field a relation points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetField {
    /// Logical field name.
    pub name: String,
    /// Physical column name.
    pub column: String,
    /// Whether the target column is nullable.
    pub nullable: bool,
    /// Target column type.
    pub db_type: ColumnType,
}

/// A resolved relation attached to a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation kind.
    pub kind: RelationType,
    /// Target model.
    pub target: ContentType,
    /// Table of the target model.
    pub target_table: String,
    /// Target field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field: Option<TargetField>,
    /// Junction model, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<Through>,
    /// On delete action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
    /// On update action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
}

impl Relation {
    /// Whether this relation is stored as a physical column.
    pub fn is_materialized(&self) -> bool {
        self.kind.is_materialized(self.through.is_some())
    }

    /// Physical column referenced on the target table.
    pub fn target_column(&self) -> Option<&str> {
        self.target_field.as_ref().map(|f| f.column.as_str())
    }
}
