//! # tidemark-schema
//!
//! Table descriptors for the Tidemark migration engine.
//!
//! This crate provides:
//! - The [`Model`] capability trait and the [`FieldDef`] builder that models
//!   use to describe their fields
//! - [`Table`], [`Column`], [`Index`] and [`Relation`] descriptors with
//!   structural equality and column diffing
//! - Typed column defaults ([`DefaultValue`]) that survive JSON round-trips
//! - An explicit [`ModelRegistry`] of apps and models
//!
//! ## Example
//!
//! ```rust,ignore
//! use tidemark_schema::{FieldDef, ModelDescriptor, ModelRegistry, RelationDef};
//!
//! let mut registry = ModelRegistry::new();
//! registry.register("auth", ModelDescriptor::new("User")
//!     .field(FieldDef::id())
//!     .field(FieldDef::string("email", 255).unique()));
//! let todo = registry.register("todo", ModelDescriptor::new("Todo")
//!     .field(FieldDef::id())
//!     .field(FieldDef::foreign_key("User", RelationDef::foreign_key("auth.User"))));
//!
//! let table = registry.build_table(&todo)?.expect("registered");
//! assert_eq!(table.get_column("User").unwrap().column, "user_id");
//! ```

pub mod column;
pub mod error;
pub mod index;
pub mod model;
pub mod registry;
pub mod relation;
pub mod table;
pub mod types;
pub mod value;

pub use column::Column;
pub use error::{SchemaError, SchemaResult};
pub use index::{Index, IndexType};
pub use model::{ContentType, Definer, FieldDef, Model, ModelDescriptor, to_snake_case};
pub use registry::{App, ModelRegistry};
pub use relation::{ModelRef, Relation, RelationDef, RelationType, TargetField, Through};
pub use table::{ColumnChange, Table, TableDiff};
pub use types::{ColumnType, ReferentialAction};
pub use value::DefaultValue;
