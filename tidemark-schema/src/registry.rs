//! Explicit registry of apps and their models.
//!
//! The registry is passed to the migration engine at construction time. It
//! answers three questions: which models exist, which app a model belongs to,
//! and what a lazily-keyed relation target resolves to.

use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::model::{ContentType, Model};
use crate::relation::ModelRef;
use crate::table::Table;

/// A named group of models.
#[derive(Clone, Default)]
pub struct App {
    name: SmolStr,
    models: IndexMap<SmolStr, Arc<dyn Model>>,
}

impl App {
    /// App name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Models in registration order.
    pub fn models(&self) -> impl Iterator<Item = (&str, &Arc<dyn Model>)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Registry of apps and models.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    apps: IndexMap<SmolStr, App>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under an app.
    ///
    /// # Panics
    ///
    /// Panics if the app already has a model with the same name.
    pub fn register(&mut self, app: &str, model: impl Model + 'static) -> ContentType {
        self.register_arc(app, Arc::new(model))
    }

    /// Register a shared model under an app.
    ///
    /// # Panics
    ///
    /// Panics if the app already has a model with the same name.
    pub fn register_arc(&mut self, app: &str, model: Arc<dyn Model>) -> ContentType {
        let name = SmolStr::new(model.model_name());
        let entry = self.apps.entry(SmolStr::new(app)).or_insert_with(|| App {
            name: SmolStr::new(app),
            models: IndexMap::new(),
        });
        if entry.models.contains_key(&name) {
            panic!("model `{name}` is already registered in app `{app}`");
        }
        entry.models.insert(name.clone(), model);
        debug!(app, model = %name, "Registered model");
        ContentType::new(app, name)
    }

    /// Apps in registration order.
    pub fn apps(&self) -> impl Iterator<Item = &App> {
        self.apps.values()
    }

    /// Every registered model identity, app by app in registration order.
    pub fn content_types(&self) -> Vec<ContentType> {
        self.apps
            .values()
            .flat_map(|app| {
                app.models
                    .keys()
                    .map(move |model| ContentType::new(app.name.clone(), model.clone()))
            })
            .collect()
    }

    /// Look up a model.
    pub fn get(&self, content_type: &ContentType) -> Option<&Arc<dyn Model>> {
        self.apps
            .get(&content_type.app)
            .and_then(|app| app.models.get(&content_type.model))
    }

    /// Check if a model is registered.
    pub fn contains(&self, content_type: &ContentType) -> bool {
        self.get(content_type).is_some()
    }

    /// Apps that have a model with the given name.
    pub fn apps_of(&self, model: &str) -> Vec<&str> {
        self.apps
            .values()
            .filter(|app| app.models.contains_key(model))
            .map(|app| app.name.as_str())
            .collect()
    }

    /// Resolve a relation target declared on `model.field`.
    ///
    /// Bare model names are looked up across all apps and must be unique.
    pub fn resolve(&self, reference: &ModelRef, model: &str, field: &str) -> SchemaResult<ContentType> {
        let unknown = || SchemaError::UnknownModel {
            model: model.to_string(),
            field: field.to_string(),
            reference: reference.to_string(),
        };

        let content_type = match reference {
            ModelRef::ContentType(ct) => ct.clone(),
            ModelRef::Lazy(key) if key.contains('.') => ContentType::parse(key)?,
            ModelRef::Lazy(key) => match self.apps_of(key).as_slice() {
                [] => return Err(unknown()),
                [app] => ContentType::new(*app, key.clone()),
                apps => {
                    return Err(SchemaError::AmbiguousModel {
                        reference: key.to_string(),
                        apps: apps.iter().map(|a| a.to_string()).collect(),
                    });
                }
            },
        };

        if self.contains(&content_type) {
            Ok(content_type)
        } else {
            Err(unknown())
        }
    }

    /// Build the current table of a registered model, or `None` if the model
    /// is not registered.
    pub fn build_table(&self, content_type: &ContentType) -> SchemaResult<Option<Table>> {
        match self.get(content_type) {
            Some(model) => Table::from_model(content_type.clone(), model.as_ref(), self).map(Some),
            None => Ok(None),
        }
    }
}
