//! Error types for building table descriptors from models.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while deriving tables from registered models.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// A relation points at a model that is not registered.
    #[error("unknown model `{reference}` referenced from `{model}.{field}`")]
    #[diagnostic(code(tidemark::schema::unknown_model))]
    UnknownModel {
        model: String,
        field: String,
        reference: String,
    },

    /// A lazy model key matches more than one registered app.
    #[error("ambiguous model reference `{reference}`: found in apps {apps:?}")]
    #[diagnostic(
        code(tidemark::schema::ambiguous_model),
        help("qualify the reference as `app.Model`")
    )]
    AmbiguousModel { reference: String, apps: Vec<String> },

    /// Invalid field definition.
    #[error("invalid field `{model}.{field}`: {message}")]
    #[diagnostic(code(tidemark::schema::invalid_field))]
    InvalidField {
        model: String,
        field: String,
        message: String,
    },

    /// Invalid relation definition.
    #[error("invalid relation `{model}.{field}`: {message}")]
    #[diagnostic(code(tidemark::schema::invalid_relation))]
    InvalidRelation {
        model: String,
        field: String,
        message: String,
    },

    /// Duplicate definition.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(tidemark::schema::duplicate))]
    Duplicate { kind: String, name: String },

    /// A content type string could not be parsed.
    #[error("invalid content type `{0}`: expected `app.Model`")]
    #[diagnostic(code(tidemark::schema::invalid_content_type))]
    InvalidContentType(String),
}

impl SchemaError {
    /// Create an invalid field error.
    pub fn invalid_field(
        model: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            model: model.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid relation error.
    pub fn invalid_relation(
        model: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRelation {
            model: model.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_display() {
        let err = SchemaError::UnknownModel {
            model: "Todo".to_string(),
            field: "user".to_string(),
            reference: "auth.Account".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("auth.Account"));
        assert!(msg.contains("Todo.user"));
    }

    #[test]
    fn test_ambiguous_model_display() {
        let err = SchemaError::AmbiguousModel {
            reference: "User".to_string(),
            apps: vec!["auth".to_string(), "legacy".to_string()],
        };
        assert!(err.to_string().contains("legacy"));
    }
}
