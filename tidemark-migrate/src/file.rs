//! Migration files and their on-disk layout.
//!
//! A migration lives at `<base>/<app>/<model>/NNNN_<description>.mig` and holds
//! pretty-printed JSON with its dependencies, the table snapshot after the
//! migration, and the actions that produce it. App, model, order and name are
//! taken from the path.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tidemark_schema::{ContentType, Table};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::action::MigrationAction;
use crate::error::{MigrateResult, MigrationError};

/// File extension of migration files.
pub const MIGRATION_EXTENSION: &str = "mig";

/// A dependency on another model's migration.
///
/// Serialized as `"app:model:migration"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dependency {
    pub app: String,
    pub model: String,
    pub migration: String,
}

impl Dependency {
    /// Create a new dependency.
    pub fn new(
        app: impl Into<String>,
        model: impl Into<String>,
        migration: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            model: model.into(),
            migration: migration.into(),
        }
    }

    /// Check if this dependency points at a model.
    pub fn targets(&self, content_type: &ContentType) -> bool {
        self.app == content_type.app.as_str() && self.model == content_type.model.as_str()
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.app, self.model, self.migration)
    }
}

impl FromStr for Dependency {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(app), Some(model), Some(migration))
                if !app.is_empty() && !model.is_empty() && !migration.is_empty() =>
            {
                Ok(Self::new(app, model, migration))
            }
            _ => Err(MigrationError::InvalidDependency(s.to_string())),
        }
    }
}

impl TryFrom<String> for Dependency {
    type Error = MigrationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dependency> for String {
    fn from(dep: Dependency) -> Self {
        dep.to_string()
    }
}

/// One model's migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationFile {
    /// App name.
    #[serde(skip)]
    pub app: String,
    /// Model name.
    #[serde(skip)]
    pub model: String,
    /// Migration name, `NNNN_<description>` without extension.
    #[serde(skip)]
    pub name: String,
    /// Position in the model's migration sequence, starting at 1.
    #[serde(skip)]
    pub order: u32,
    /// Model this migration belongs to.
    pub content_type: ContentType,
    /// Migrations that must be applied first.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Table snapshot after this migration.
    pub table: Table,
    /// Actions in application order.
    pub actions: Vec<MigrationAction>,
}

impl MigrationFile {
    /// Create a new migration, naming it after its actions.
    pub fn new(
        content_type: ContentType,
        order: u32,
        table: Table,
        actions: Vec<MigrationAction>,
    ) -> Self {
        Self {
            app: content_type.app.to_string(),
            model: content_type.model.to_string(),
            name: migration_name(order, &actions),
            order,
            content_type,
            dependencies: Vec::new(),
            table,
            actions,
        }
    }

    /// Decode a migration from its JSON contents and relative location.
    pub fn from_json(
        app: &str,
        model: &str,
        file_name: &str,
        contents: &str,
        path: &Path,
    ) -> MigrateResult<Self> {
        let (order, name) = parse_migration_name(file_name)?;
        let mut file: MigrationFile =
            serde_json::from_str(contents).map_err(|source| MigrationError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if file.content_type.app != app || file.content_type.model != model {
            return Err(MigrationError::invalid_migration(format!(
                "{} belongs to `{}` but is stored under `{app}/{model}`",
                path.display(),
                file.content_type
            )));
        }

        file.app = app.to_string();
        file.model = model.to_string();
        file.name = name;
        file.order = order;
        Ok(file)
    }

    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> MigrateResult<String> {
        serde_json::to_string_pretty(self).map_err(MigrationError::Serialize)
    }

    /// Graph key, `app:model:name`.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.app, self.model, self.name)
    }

    /// File name with extension.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, MIGRATION_EXTENSION)
    }

    /// Path relative to the migrations directory.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.app).join(&self.model).join(self.file_name())
    }

    /// A dependency pointing at this migration.
    pub fn as_dependency(&self) -> Dependency {
        Dependency::new(&self.app, &self.model, &self.name)
    }

    /// Check if this migration drops its table.
    pub fn is_drop(&self) -> bool {
        matches!(self.actions.last(), Some(MigrationAction::DropTable { .. }))
    }
}

/// Build a migration name from its order and actions.
///
/// The description is the first action's verb, with `_and_N_more` when there
/// is more than one action.
pub fn migration_name(order: u32, actions: &[MigrationAction]) -> String {
    let verb = actions
        .first()
        .map(|a| a.action_type().as_str())
        .unwrap_or("empty");
    match actions.len() {
        0 | 1 => format!("{order:04}_{verb}"),
        n => format!("{order:04}_{verb}_and_{}_more", n - 1),
    }
}

/// Parse a migration file name into its order and name.
///
/// Accepts `0003_add_field.mig` or `0003_add_field`.
pub fn parse_migration_name(file_name: &str) -> MigrateResult<(u32, String)> {
    let name = file_name
        .strip_suffix(&format!(".{MIGRATION_EXTENSION}"))
        .unwrap_or(file_name);
    let invalid = || MigrationError::InvalidFileName(file_name.to_string());

    let (prefix, description) = name.split_once('_').ok_or_else(invalid)?;
    if prefix.len() != 4 || !prefix.bytes().all(|b| b.is_ascii_digit()) || description.is_empty() {
        return Err(invalid());
    }
    let order: u32 = prefix.parse().map_err(|_| invalid())?;
    if order == 0 {
        return Err(invalid());
    }

    Ok((order, name.to_string()))
}

/// Reads and writes migration files under a base directory.
#[derive(Debug, Clone)]
pub struct MigrationFileManager {
    migrations_dir: PathBuf,
}

impl MigrationFileManager {
    /// Create a new file manager.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Directory holding one model's migrations.
    pub fn model_dir(&self, app: &str, model: &str) -> PathBuf {
        self.migrations_dir.join(app).join(model)
    }

    /// List every migration file, app by app and model by model, in name order.
    ///
    /// A missing migrations directory is an empty history.
    pub async fn list_migrations(&self) -> MigrateResult<Vec<MigrationFile>> {
        let mut migrations = Vec::new();

        if !tokio::fs::try_exists(&self.migrations_dir)
            .await
            .map_err(|e| MigrationError::io(&self.migrations_dir, e))?
        {
            return Ok(migrations);
        }

        for app_dir in sorted_entries(&self.migrations_dir, true).await? {
            for model_dir in sorted_entries(&app_dir, true).await? {
                for path in sorted_entries(&model_dir, false).await? {
                    if path.extension().and_then(|e| e.to_str()) != Some(MIGRATION_EXTENSION) {
                        continue;
                    }
                    migrations.push(self.read_migration(&path).await?);
                }
            }
        }

        Ok(migrations)
    }

    /// Read a single migration file.
    pub async fn read_migration(&self, path: &Path) -> MigrateResult<MigrationFile> {
        let (app, model, file_name) = split_path(path)?;
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MigrationError::io(path, e))?;

        let file = MigrationFile::from_json(app, model, file_name, &contents, path)?;
        debug!(path = %path.display(), "Loaded migration");
        Ok(file)
    }

    /// Write a new migration file.
    ///
    /// Fails with [`MigrationError::AlreadyExists`] instead of overwriting.
    pub async fn write_migration(&self, migration: &MigrationFile) -> MigrateResult<PathBuf> {
        let dir = self.model_dir(&migration.app, &migration.model);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| MigrationError::io(&dir, e))?;

        let path = dir.join(migration.file_name());
        let mut contents = migration.to_json()?;
        contents.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    MigrationError::AlreadyExists(path.clone())
                } else {
                    MigrationError::io(&path, e)
                }
            })?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| MigrationError::io(&path, e))?;
        file.flush().await.map_err(|e| MigrationError::io(&path, e))?;

        Ok(path)
    }
}

/// Directory entries sorted by name, keeping only directories or only files.
async fn sorted_entries(dir: &Path, dirs: bool) -> MigrateResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| MigrationError::io(dir, e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| MigrationError::io(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| MigrationError::io(entry.path(), e))?;
        if file_type.is_dir() == dirs {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Split `.../<app>/<model>/<file>` into its last three components.
fn split_path(path: &Path) -> MigrateResult<(&str, &str, &str)> {
    let invalid = || MigrationError::InvalidFileName(path.display().to_string());
    let mut components = path.iter().rev().map(|c| c.to_str());

    match (components.next(), components.next(), components.next()) {
        (Some(Some(file)), Some(Some(model)), Some(Some(app))) => Ok((app, model, file)),
        _ => Err(invalid()),
    }
}
