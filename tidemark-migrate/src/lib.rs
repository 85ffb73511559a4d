//! # tidemark-migrate
//!
//! Migration engine for Tidemark.
//!
//! This crate provides functionality for:
//! - Diffing each model's current table against the table recorded by its
//!   last migration
//! - Versioned, per-model migration files (`<app>/<model>/NNNN_<desc>.mig`)
//! - Dependency linking between migrations of related models
//! - Dependency-ordered application through a pluggable [`SchemaEditor`]
//! - A SQL schema editor for PostgreSQL, MySQL and SQLite
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ ModelRegistry │────▶│ Table Differ │────▶│ Migration File │
//! └───────────────┘     └──────────────┘     └────────────────┘
//!                                                    │
//!                                                    ▼
//!                       ┌──────────────┐     ┌────────────────┐
//!                       │ SchemaEditor │◀────│ Dependency     │
//!                       └──────────────┘     │ Graph          │
//!                              │             └────────────────┘
//!                              ▼
//!                       ┌──────────────┐
//!                       │ Applied Log  │
//!                       └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tidemark_migrate::{MigrationConfig, MigrationEngine, SqlSchemaEditor, TidemarkConfig};
//!
//! async fn run_migrations(registry: ModelRegistry, executor: impl SqlExecutor) -> MigrateResult<()> {
//!     let config = TidemarkConfig::from_file("tidemark.toml").await?;
//!     let editor = SqlSchemaEditor::new(executor, config.dialect())
//!         .with_ledger_table(&config.migrations.table_name);
//!
//!     let engine = MigrationEngine::new(config.migration_config(), editor, registry);
//!
//!     // Write new migration files for changed models
//!     engine.make_migrations().await?;
//!
//!     // Apply everything not yet recorded by the editor
//!     let report = engine.migrate().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod config;
pub mod differ;
pub mod editor;
pub mod embedded;
pub mod engine;
pub mod error;
pub mod file;
pub mod graph;
pub mod history;
pub mod memory;
pub mod sql;

pub use action::{ActionType, MigrationAction};
pub use config::{DatabaseConfig, DatabaseProvider, TidemarkConfig};
pub use differ::TableDiffer;
pub use editor::{SchemaEditor, apply_action};
pub use embedded::EmbeddedMigrations;
pub use engine::{MigrateReport, MigrationConfig, MigrationEngine, MigrationStatus};
pub use error::{MigrateResult, MigrationError};
pub use file::{
    Dependency, MIGRATION_EXTENSION, MigrationFile, MigrationFileManager, migration_name,
    parse_migration_name,
};
pub use graph::DependencyGraph;
pub use history::MigrationHistory;
pub use memory::MemoryEditor;
pub use sql::{DEFAULT_LEDGER_TABLE, Dialect, SqlExecutor, SqlSchemaEditor};
