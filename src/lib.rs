//! # Tidemark
//!
//! Model-driven schema migrations for Rust.
//!
//! Tidemark provides:
//! - Table descriptors derived from your models, with structural diffing
//! - One versioned, replayable migration file per model change
//! - Dependency linking between migrations of related models
//! - Dependency-ordered application through a pluggable schema editor
//! - DDL for PostgreSQL, MySQL and SQLite
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tidemark::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tidemark::MigrationError> {
//!     let mut registry = ModelRegistry::new();
//!     registry.register("auth", ModelDescriptor::new("User")
//!         .field(FieldDef::id())
//!         .field(FieldDef::string("email", 255).unique()));
//!     registry.register("todo", ModelDescriptor::new("Todo")
//!         .field(FieldDef::id())
//!         .field(FieldDef::string("title", 200))
//!         .field(FieldDef::foreign_key("User", RelationDef::foreign_key("auth.User"))));
//!
//!     let config = TidemarkConfig::from_file("tidemark.toml").await?;
//!     let editor = SqlSchemaEditor::new(my_executor(), config.dialect());
//!     let engine = MigrationEngine::new(config.migration_config(), editor, registry);
//!
//!     engine.make_migrations().await?;
//!     engine.migrate().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Table, column, index and relation descriptors.
pub mod schema {
    pub use tidemark_schema::*;
}

/// Migration engine, files and schema editors.
pub mod migrate {
    pub use tidemark_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        MemoryEditor, MigrateReport, MigrationConfig, MigrationEngine, SchemaEditor,
        SqlExecutor, SqlSchemaEditor, TidemarkConfig,
    };
    pub use crate::schema::{
        ColumnType, ContentType, DefaultValue, FieldDef, Index, Model, ModelDescriptor,
        ModelRegistry, ReferentialAction, RelationDef,
    };
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationError};
pub use schema::{SchemaError, SchemaResult};
