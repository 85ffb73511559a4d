//! The model capability consumed by the migration engine.
//!
//! The engine never reflects over application types. A model only has to
//! describe itself through [`Model`]: a name, a table name and an ordered list
//! of [`FieldDef`]s. [`ModelDescriptor`] is a ready-made implementation for
//! hand-built models and fixtures.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::SchemaError;
use crate::index::Index;
use crate::relation::RelationDef;
use crate::types::ColumnType;
use crate::value::DefaultValue;

/// Identity of a model: the app it belongs to and its name.
///
/// Serialized as `"app.Model"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentType {
    /// App name.
    pub app: SmolStr,
    /// Model name.
    pub model: SmolStr,
}

impl ContentType {
    /// Create a new content type.
    pub fn new(app: impl Into<SmolStr>, model: impl Into<SmolStr>) -> Self {
        Self {
            app: app.into(),
            model: model.into(),
        }
    }

    /// Parse `"app.Model"`.
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        match s.split_once('.') {
            Some((app, model)) if !app.is_empty() && !model.is_empty() && !model.contains('.') => {
                Ok(Self::new(app, model))
            }
            _ => Err(SchemaError::InvalidContentType(s.to_string())),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.app, self.model)
    }
}

impl TryFrom<String> for ContentType {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentType> for String {
    fn from(ct: ContentType) -> Self {
        ct.to_string()
    }
}

/// Anything that can list its fields in declaration order.
pub trait Definer {
    /// The ordered field list.
    fn field_defs(&self) -> Vec<FieldDef>;
}

/// A model that can be migrated.
pub trait Model: Definer + Send + Sync {
    /// Model name, unique within its app.
    fn model_name(&self) -> &str;

    /// Database table name.
    fn table_name(&self) -> String {
        to_snake_case(self.model_name())
    }

    /// Explicit indexes.
    fn indexes(&self) -> Vec<Index> {
        Vec::new()
    }

    /// Whether the migration engine should manage this model's table.
    fn can_migrate(&self) -> bool {
        true
    }
}

/// Definition of one model field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Logical field name.
    pub name: String,
    /// Physical column name; derived from the field name when absent.
    pub column: Option<String>,
    /// Column type; copied from the relation target when absent.
    pub db_type: Option<ColumnType>,
    /// Host type tag; derived from the column type when absent.
    pub rust_type: Option<String>,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub primary: bool,
    /// Whether the database generates the value.
    pub auto_increment: bool,
    /// Whether values must be unique.
    pub unique: bool,
    /// Minimum string length.
    pub min_length: Option<u32>,
    /// Maximum string length.
    pub max_length: Option<u32>,
    /// Minimum numeric value.
    pub min_value: Option<f64>,
    /// Maximum numeric value.
    pub max_value: Option<f64>,
    /// Total digits of a decimal.
    pub precision: Option<u32>,
    /// Digits after the decimal point.
    pub scale: Option<u32>,
    /// Default value, if any.
    pub default: Option<DefaultValue>,
    /// Declared relation, if any.
    pub relation: Option<RelationDef>,
    /// Whether the field is stored at all.
    pub use_in_db: bool,
}

impl FieldDef {
    /// Create a new field of the given type.
    pub fn new(name: impl Into<String>, db_type: ColumnType) -> Self {
        Self {
            db_type: Some(db_type),
            ..Self::untyped(name)
        }
    }

    fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            db_type: None,
            rust_type: None,
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

    /// An auto-incrementing `BIGINT` primary key named `id`.
    pub fn id() -> Self {
        Self::new("id", ColumnType::BigInt)
            .primary()
            .auto_increment()
    }

    /// A bounded string field.
    pub fn string(name: impl Into<String>, max_length: u32) -> Self {
        Self::new(name, ColumnType::VarChar).max_length(max_length)
    }

    /// An unbounded text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    /// A boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    /// A 32-bit integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int)
    }

    /// A timestamp field.
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::DateTime)
    }

    /// A foreign key field; stored as `<name>_id` with the target key's type.
    pub fn foreign_key(name: impl Into<String>, relation: RelationDef) -> Self {
        let name = name.into();
        let column = format!("{}_id", to_snake_case(&name));
        Self::untyped(name).column(column).relation(relation)
    }

    /// A relation field with no physical column of its own.
    pub fn reverse(name: impl Into<String>, relation: RelationDef) -> Self {
        Self::untyped(name).relation(relation)
    }

    /// Set the physical column name.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Set the host type tag.
    pub fn rust_type(mut self, ty: impl Into<String>) -> Self {
        self.rust_type = Some(ty.into());
        self
    }

    /// Mark as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
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

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the minimum length.
    pub fn min_length(mut self, len: u32) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Set the maximum length.
    pub fn max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Set the numeric range.
    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    /// Set numeric precision and scale.
    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attach a relation.
    ///
    /// Relations that are never materialized also clear `use_in_db`.
    pub fn relation(mut self, relation: RelationDef) -> Self {
        if !relation.is_materialized() {
            self.use_in_db = false;
        }
        self.relation = Some(relation);
        self
    }

    /// Exclude the field from physical storage.
    pub fn not_stored(mut self) -> Self {
        self.use_in_db = false;
        self
    }

    /// Physical column name.
    pub fn column_name(&self) -> String {
        self.column
            .clone()
            .unwrap_or_else(|| to_snake_case(&self.name))
    }
}

/// A model described entirely by data.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    name: String,
    table: Option<String>,
    fields: Vec<FieldDef>,
    indexes: Vec<Index>,
    migrate: bool,
}

impl ModelDescriptor {
    /// Create a new model descriptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: Vec::new(),
            indexes: Vec::new(),
            migrate: true,
        }
    }

    /// Override the table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Append a field.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Append an index.
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Opt the model out of migrations.
    pub fn unmanaged(mut self) -> Self {
        self.migrate = false;
        self
    }
}

impl Definer for ModelDescriptor {
    fn field_defs(&self) -> Vec<FieldDef> {
        self.fields.clone()
    }
}

impl Model for ModelDescriptor {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn table_name(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| to_snake_case(&self.name))
    }

    fn indexes(&self) -> Vec<Index> {
        self.indexes.clone()
    }

    fn can_migrate(&self) -> bool {
        self.migrate
    }
}

/// Convert `BlogPost` or `blogPost` to `blog_post`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parse_and_display() {
        let ct = ContentType::parse("auth.User").unwrap();
        assert_eq!(ct.app, "auth");
        assert_eq!(ct.model, "User");
        assert_eq!(ct.to_string(), "auth.User");

        assert!(ContentType::parse("User").is_err());
        assert!(ContentType::parse(".User").is_err());
        assert!(ContentType::parse("a.b.c").is_err());
    }

    #[test]
    fn test_content_type_serializes_as_string() {
        let ct = ContentType::new("blog", "BlogPost");
        assert_eq!(serde_json::to_string(&ct).unwrap(), "\"blog.BlogPost\"");
        let back: ContentType = serde_json::from_str("\"blog.BlogPost\"").unwrap();
        assert_eq!(back, ct);
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("BlogPost"), "blog_post");
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("HTTPLog"), "httplog");
    }

    #[test]
    fn test_field_def_builders() {
        let id = FieldDef::id();
        assert!(id.primary && id.auto_increment);
        assert_eq!(id.db_type, Some(ColumnType::BigInt));

        let email = FieldDef::string("email", 255).unique();
        assert_eq!(email.max_length, Some(255));
        assert_eq!(email.column_name(), "email");

        let author = FieldDef::foreign_key("Author", RelationDef::foreign_key("auth.User"));
        assert_eq!(author.column_name(), "author_id");
        assert!(author.db_type.is_none());
        assert!(author.use_in_db);

        let posts = FieldDef::reverse("posts", RelationDef::one_to_many("blog.BlogPost"));
        assert!(!posts.use_in_db);
    }

    #[test]
    fn test_model_descriptor_defaults() {
        let model = ModelDescriptor::new("BlogPost").field(FieldDef::id());
        assert_eq!(model.model_name(), "BlogPost");
        assert_eq!(model.table_name(), "blog_post");
        assert!(model.can_migrate());
        assert_eq!(model.field_defs().len(), 1);

        let legacy = ModelDescriptor::new("Legacy").table("old_legacy").unmanaged();
        assert_eq!(legacy.table_name(), "old_legacy");
        assert!(!legacy.can_migrate());
    }
}
