//! Migration engine implementation.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use tidemark_schema::{ContentType, ModelRegistry, Table};
use tracing::{debug, error, info, warn};

use crate::differ::TableDiffer;
use crate::editor::{SchemaEditor, apply_action};
use crate::embedded::EmbeddedMigrations;
use crate::error::MigrateResult;
use crate::file::{Dependency, MigrationFile, MigrationFileManager};
use crate::graph::DependencyGraph;
use crate::history::MigrationHistory;

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Whether to run in dry-run mode.
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Enable dry-run mode.
    ///
    /// `make_migrations` returns the files it would write without writing
    /// them, and `migrate` returns the plan without applying anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Result of a `migrate` call.
#[derive(Debug, Default)]
pub struct MigrateReport {
    /// Keys of applied migrations, in application order.
    pub applied: Vec<String>,
    /// Keys of migrations a dry run would apply, in order.
    pub planned: Vec<String>,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
}

impl MigrateReport {
    /// Check if any migrations were applied.
    pub fn has_changes(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        if !self.planned.is_empty() {
            return format!("[DRY RUN] {} pending", self.planned.len());
        }
        if self.applied.is_empty() {
            "No migrations applied".to_string()
        } else {
            format!("{} applied in {}ms", self.applied.len(), self.duration_ms)
        }
    }
}

/// Migration status information.
#[derive(Debug, Default)]
pub struct MigrationStatus {
    /// Keys of applied migrations.
    pub applied: Vec<String>,
    /// Keys of pending migrations.
    pub pending: Vec<String>,
}

impl MigrationStatus {
    /// Check if everything is applied.
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The main migration engine.
///
/// Holds no state between calls: every operation rebuilds the migration history
/// from the migrations directory and the embedded sets.
pub struct MigrationEngine<E: SchemaEditor> {
    config: MigrationConfig,
    editor: E,
    registry: ModelRegistry,
    file_manager: MigrationFileManager,
    embedded: Vec<EmbeddedMigrations>,
}

impl<E: SchemaEditor> MigrationEngine<E> {
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig, editor: E, registry: ModelRegistry) -> Self {
        let file_manager = MigrationFileManager::new(&config.migrations_dir);
        Self {
            config,
            editor,
            registry,
            file_manager,
            embedded: Vec::new(),
        }
    }

    /// Register a set of migrations compiled into the binary.
    pub fn with_embedded(mut self, embedded: EmbeddedMigrations) -> Self {
        self.embedded.push(embedded);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the schema editor.
    pub fn editor(&self) -> &E {
        &self.editor
    }

    /// Get the model registry.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Get the model registry for modification.
    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    /// Get the file manager.
    pub fn file_manager(&self) -> &MigrationFileManager {
        &self.file_manager
    }

    /// Load every known migration. On-disk files win over embedded ones with
    /// the same key.
    pub async fn load_history(&self) -> MigrateResult<MigrationHistory> {
        let mut files = self.file_manager.list_migrations().await?;
        let mut seen: HashSet<String> = files.iter().map(MigrationFile::key).collect();

        for embedded in &self.embedded {
            for file in embedded.load()? {
                if seen.insert(file.key()) {
                    files.push(file);
                } else {
                    warn!(
                        app = embedded.app(),
                        migration = %file.key(),
                        "Embedded migration shadowed by file on disk"
                    );
                }
            }
        }

        let history = MigrationHistory::from_files(files)?;
        debug!(migrations = history.len(), "Loaded migration history");
        Ok(history)
    }

    /// Diff every model against its last migration and write one new migration
    /// per changed model.
    ///
    /// Returns the new migrations. No changes is not an error.
    pub async fn make_migrations(&self) -> MigrateResult<Vec<MigrationFile>> {
        let mut history = self.load_history().await?;
        let created = self.diff_models(&history)?;

        if created.is_empty() {
            info!("No changes detected");
            return Ok(Vec::new());
        }

        for file in &created {
            history.insert(file.clone())?;
        }

        let created: Vec<MigrationFile> = created
            .into_iter()
            .map(|mut file| {
                file.dependencies = link_dependencies(&history, &file);
                file
            })
            .collect();

        for file in &created {
            if self.config.dry_run {
                info!(migration = %file.key(), "[DRY RUN] Would create migration");
                continue;
            }
            let path = self.file_manager.write_migration(file).await?;
            info!(
                migration = %file.key(),
                path = %path.display(),
                actions = file.actions.len(),
                dependencies = file.dependencies.len(),
                "Created migration"
            );
        }

        Ok(created)
    }

    /// Models that would get a new migration, without writing anything.
    pub async fn needs_to_migrate(&self) -> MigrateResult<Vec<ContentType>> {
        let history = self.load_history().await?;
        Ok(self
            .diff_models(&history)?
            .into_iter()
            .map(|file| file.content_type)
            .collect())
    }

    /// The most recent migration of a model.
    pub async fn get_last_migration(
        &self,
        app: &str,
        model: &str,
    ) -> MigrateResult<Option<MigrationFile>> {
        let history = self.load_history().await?;
        Ok(history.last(app, model).cloned())
    }

    /// Apply every pending migration in dependency order.
    ///
    /// A failing action stops the run. Migrations applied earlier in the same
    /// run stay applied and recorded.
    pub async fn migrate(&self) -> MigrateResult<MigrateReport> {
        let start = Instant::now();
        let history = self.load_history().await?;

        self.editor.setup().await?;
        let (applied, pending) = self.partition(&history).await?;
        let ordered = DependencyGraph::build(pending, &applied)?.sort()?;

        let mut report = MigrateReport::default();
        for file in ordered {
            if self.config.dry_run {
                info!(migration = %file.key(), "[DRY RUN] Would apply migration");
                report.planned.push(file.key());
                continue;
            }

            if let Err(e) = self.apply_migration(&file).await {
                error!(migration = %file.key(), error = %e, "Migration failed");
                return Err(e);
            }
            report.applied.push(file.key());
        }

        report.duration_ms = start.elapsed().as_millis() as i64;
        info!("{}", report.summary());
        Ok(report)
    }

    /// Get migration status.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let history = self.load_history().await?;
        self.editor.setup().await?;
        let (applied, pending) = self.partition(&history).await?;

        let mut applied: Vec<String> = applied.into_iter().collect();
        applied.sort();
        Ok(MigrationStatus {
            applied,
            pending: pending.iter().map(MigrationFile::key).collect(),
        })
    }

    async fn apply_migration(&self, file: &MigrationFile) -> MigrateResult<()> {
        info!(migration = %file.key(), actions = file.actions.len(), "Applying migration");
        for action in &file.actions {
            apply_action(&self.editor, &file.table, action).await?;
        }
        self.editor
            .store_migration(&file.app, &file.model, &file.name)
            .await
    }

    /// Split the history into applied keys and pending migrations.
    async fn partition(
        &self,
        history: &MigrationHistory,
    ) -> MigrateResult<(HashSet<String>, Vec<MigrationFile>)> {
        let mut applied = HashSet::new();
        let mut pending = Vec::new();

        for file in history.iter() {
            if self
                .editor
                .has_migration(&file.app, &file.model, &file.name)
                .await?
            {
                applied.insert(file.key());
            } else {
                pending.push(file.clone());
            }
        }

        // Dependencies with no file of their own may still be on record.
        let pending_keys: HashSet<String> = pending.iter().map(MigrationFile::key).collect();
        let mut unknown: Vec<&Dependency> = pending
            .iter()
            .flat_map(|file| file.dependencies.iter())
            .filter(|dep| {
                let key = dep.to_string();
                !pending_keys.contains(&key) && !applied.contains(&key)
            })
            .collect();
        unknown.sort();
        unknown.dedup();

        for dep in unknown {
            if self
                .editor
                .has_migration(&dep.app, &dep.model, &dep.migration)
                .await?
            {
                debug!(dependency = %dep, "Dependency applied without a migration file");
                applied.insert(dep.to_string());
            }
        }

        Ok((applied, pending))
    }

    /// New migrations for registered models that changed and for models that
    /// left the registry. Dependencies are not linked yet.
    fn diff_models(&self, history: &MigrationHistory) -> MigrateResult<Vec<MigrationFile>> {
        let mut files = Vec::new();

        for content_type in self.registry.content_types() {
            let can_migrate = self
                .registry
                .get(&content_type)
                .is_some_and(|model| model.can_migrate());
            if !can_migrate {
                debug!(model = %content_type, "Skipping unmanaged model");
                continue;
            }

            let current = self.registry.build_table(&content_type)?;
            files.extend(diff_model(history, &content_type, current.as_ref()));
        }

        for content_type in history.content_types() {
            if !self.registry.contains(&content_type) {
                files.extend(diff_model(history, &content_type, None));
            }
        }

        Ok(files)
    }
}

fn diff_model(
    history: &MigrationHistory,
    content_type: &ContentType,
    current: Option<&Table>,
) -> Option<MigrationFile> {
    let previous = history.last_table(&content_type.app, &content_type.model);
    let actions = TableDiffer::new(current).with_previous(previous).diff();
    if actions.is_empty() {
        return None;
    }

    let table = current.or(previous)?.clone();
    let order = history.next_order(&content_type.app, &content_type.model);
    debug!(model = %content_type, order, actions = actions.len(), "Model changed");
    Some(MigrationFile::new(content_type.clone(), order, table, actions))
}

/// Dependencies of a new migration on the latest migrations of the models its
/// foreign keys point at.
///
/// A dependency already recorded by an earlier migration of the same model is
/// not repeated. Drops link nothing.
fn link_dependencies(history: &MigrationHistory, file: &MigrationFile) -> Vec<Dependency> {
    if file.is_drop() {
        return Vec::new();
    }

    let earlier: Vec<&MigrationFile> = history
        .for_model(&file.app, &file.model)
        .iter()
        .filter(|m| m.order < file.order)
        .collect();

    let mut deps: Vec<Dependency> = Vec::new();
    for column in file.table.foreign_keys() {
        let Some(relation) = column.relation.as_ref() else {
            continue;
        };
        if relation.target == file.content_type {
            continue;
        }
        let Some(latest) = history.last(&relation.target.app, &relation.target.model) else {
            continue;
        };

        let dep = latest.as_dependency();
        let recorded = earlier.iter().any(|m| m.dependencies.contains(&dep));
        if !recorded && !deps.contains(&dep) {
            deps.push(dep);
        }
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::MigrationAction;
    use crate::memory::MemoryEditor;
    use pretty_assertions::assert_eq;
    use tidemark_schema::{ColumnType, FieldDef, ModelDescriptor, RelationDef};

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.register(
            "auth",
            ModelDescriptor::new("User")
                .field(FieldDef::id())
                .field(FieldDef::string("email", 255).unique()),
        );
        registry.register(
            "todo",
            ModelDescriptor::new("Todo")
                .field(FieldDef::id())
                .field(FieldDef::string("title", 200))
                .field(FieldDef::foreign_key("User", RelationDef::foreign_key("auth.User"))),
        );
        registry
    }

    fn engine(dir: &std::path::Path, dry_run: bool) -> MigrationEngine<MemoryEditor> {
        MigrationEngine::new(
            MigrationConfig::new().migrations_dir(dir).dry_run(dry_run),
            MemoryEditor::new(),
            registry(),
        )
    }

    #[test]
    fn test_config_builder() {
        let config = MigrationConfig::new()
            .migrations_dir("./custom_migrations")
            .dry_run(true);
        assert_eq!(config.migrations_dir, PathBuf::from("./custom_migrations"));
        assert!(config.dry_run);
        assert!(!MigrationConfig::default().dry_run);
    }

    #[test]
    fn test_report_summary() {
        let mut report = MigrateReport::default();
        assert_eq!(report.summary(), "No migrations applied");
        report.applied.push("auth:User:0001_create_table".into());
        report.duration_ms = 3;
        assert_eq!(report.summary(), "1 applied in 3ms");
    }

    #[tokio::test]
    async fn test_make_migrations_writes_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);

        let created = engine.make_migrations().await.unwrap();
        assert_eq!(created.len(), 2);
        assert!(dir.path().join("auth/User/0001_create_table.mig").exists());
        assert!(dir.path().join("todo/Todo/0001_create_table.mig").exists());

        let todo = engine.get_last_migration("todo", "Todo").await.unwrap().unwrap();
        assert_eq!(
            todo.dependencies,
            vec![Dependency::new("auth", "User", "0001_create_table")]
        );

        assert!(engine.make_migrations().await.unwrap().is_empty());
        assert!(engine.needs_to_migrate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), true);

        assert_eq!(engine.make_migrations().await.unwrap().len(), 2);
        assert!(!dir.path().join("auth").exists());

        let report = engine.migrate().await.unwrap();
        assert!(report.planned.is_empty());
        assert!(engine.editor().calls().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_plans_written_migrations() {
        let dir = tempfile::tempdir().unwrap();
        engine(dir.path(), false).make_migrations().await.unwrap();

        let engine = engine(dir.path(), true);
        let report = engine.migrate().await.unwrap();
        assert_eq!(
            report.planned,
            vec!["auth:User:0001_create_table", "todo:Todo:0001_create_table"]
        );
        assert!(report.applied.is_empty());
        assert!(engine.editor().calls().is_empty());
        assert!(engine.editor().applied().is_empty());
    }

    #[tokio::test]
    async fn test_unmanaged_model_gets_no_migration() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = registry();
        registry.register(
            "auth",
            ModelDescriptor::new("Legacy")
                .field(FieldDef::id())
                .unmanaged(),
        );
        let engine = MigrationEngine::new(
            MigrationConfig::new().migrations_dir(dir.path()),
            MemoryEditor::new(),
            registry,
        );

        let created = engine.make_migrations().await.unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|f| f.model != "Legacy"));
        assert!(!dir.path().join("auth/Legacy").exists());
        assert!(engine.needs_to_migrate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_default_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ModelRegistry::new();
        registry.register(
            "shop",
            ModelDescriptor::new("Item")
                .field(FieldDef::id())
                .field(FieldDef::new("limit", ColumnType::Double).default_value(f64::INFINITY)),
        );
        let engine = MigrationEngine::new(
            MigrationConfig::new().migrations_dir(dir.path()),
            MemoryEditor::new(),
            registry,
        );

        assert!(engine.make_migrations().await.is_err());
        assert!(!dir.path().join("shop").exists());
    }

    #[tokio::test]
    async fn test_migrate_applies_in_order_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);
        engine.make_migrations().await.unwrap();

        let report = engine.migrate().await.unwrap();
        assert_eq!(
            report.applied,
            vec!["auth:User:0001_create_table", "todo:Todo:0001_create_table"]
        );
        assert_eq!(
            engine.editor().calls(),
            vec![
                "create_table user",
                "store_migration auth:User:0001_create_table",
                "create_table todo",
                "store_migration todo:Todo:0001_create_table",
            ]
        );

        let again = engine.migrate().await.unwrap();
        assert!(!again.has_changes());
        assert!(engine.status().await.unwrap().is_up_to_date());
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MigrationEngine::new(
            MigrationConfig::new().migrations_dir(dir.path()),
            MemoryEditor::new().fail_on("create_table todo"),
            registry(),
        );
        engine.make_migrations().await.unwrap();

        assert!(engine.migrate().await.is_err());
        assert_eq!(engine.editor().applied(), vec!["auth:User:0001_create_table"]);

        let status = engine.status().await.unwrap();
        assert_eq!(status.pending, vec!["todo:Todo:0001_create_table"]);
    }

    #[tokio::test]
    async fn test_unregistered_model_is_dropped_and_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(dir.path(), false);
        engine.make_migrations().await.unwrap();

        let mut without_todo = ModelRegistry::new();
        without_todo.register(
            "auth",
            ModelDescriptor::new("User")
                .field(FieldDef::id())
                .field(FieldDef::string("email", 255).unique()),
        );
        *engine.registry_mut() = without_todo;

        let created = engine.make_migrations().await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].key(), "todo:Todo:0002_drop_table");
        assert!(created[0].dependencies.is_empty());
        assert!(matches!(
            created[0].actions.as_slice(),
            [MigrationAction::DropTable { .. }]
        ));
        assert!(engine.make_migrations().await.unwrap().is_empty());

        *engine.registry_mut() = registry();
        let created = engine.make_migrations().await.unwrap();
        assert_eq!(created[0].key(), "todo:Todo:0003_create_table");
    }
}
