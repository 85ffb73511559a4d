//! Scalar column types and referential actions.

use serde::{Deserialize, Serialize};

/// Database-level column types understood by every schema editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Fixed precision decimal.
    Decimal,
    /// Bounded string (`max_length` applies).
    VarChar,
    /// Unbounded text.
    Text,
    /// Boolean.
    Boolean,
    /// Timestamp with time zone.
    DateTime,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// JSON document.
    Json,
    /// Binary data.
    Bytes,
    /// UUID.
    Uuid,
}

impl ColumnType {
    /// Parse a column type from its serialized name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "small_int" => Some(Self::SmallInt),
            "int" => Some(Self::Int),
            "big_int" => Some(Self::BigInt),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "decimal" => Some(Self::Decimal),
            "var_char" => Some(Self::VarChar),
            "text" => Some(Self::Text),
            "boolean" => Some(Self::Boolean),
            "date_time" => Some(Self::DateTime),
            "date" => Some(Self::Date),
            "time" => Some(Self::Time),
            "json" => Some(Self::Json),
            "bytes" => Some(Self::Bytes),
            "uuid" => Some(Self::Uuid),
            _ => None,
        }
    }

    /// Get the serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmallInt => "small_int",
            Self::Int => "int",
            Self::BigInt => "big_int",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::VarChar => "var_char",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::DateTime => "date_time",
            Self::Date => "date",
            Self::Time => "time",
            Self::Json => "json",
            Self::Bytes => "bytes",
            Self::Uuid => "uuid",
        }
    }

    /// The Rust type a model field of this column type usually has.
    pub fn rust_type(&self) -> &'static str {
        match self {
            Self::SmallInt => "i16",
            Self::Int => "i32",
            Self::BigInt => "i64",
            Self::Float => "f32",
            Self::Double => "f64",
            Self::Decimal => "rust_decimal::Decimal",
            Self::VarChar | Self::Text => "String",
            Self::Boolean => "bool",
            Self::DateTime => "chrono::DateTime<chrono::Utc>",
            Self::Date => "chrono::NaiveDate",
            Self::Time => "chrono::NaiveTime",
            Self::Json => "serde_json::Value",
            Self::Bytes => "Vec<u8>",
            Self::Uuid => "uuid::Uuid",
        }
    }

    /// Check if this is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::SmallInt | Self::Int | Self::BigInt)
    }

    /// Check if this is a numeric type.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::Float | Self::Double | Self::Decimal)
    }

    /// Check if this is a string type.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::VarChar | Self::Text)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Referential actions for foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    /// Cascade the operation.
    Cascade,
    /// Restrict the operation (error if references exist).
    Restrict,
    /// No action (deferred check).
    NoAction,
    /// Set to null.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl ReferentialAction {
    /// Parse from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Cascade" | "CASCADE" => Some(Self::Cascade),
            "Restrict" | "RESTRICT" => Some(Self::Restrict),
            "NoAction" | "NO ACTION" => Some(Self::NoAction),
            "SetNull" | "SET NULL" => Some(Self::SetNull),
            "SetDefault" | "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }

    /// Get the SQL keyword for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_names_round_trip() {
        for ty in [
            ColumnType::SmallInt,
            ColumnType::BigInt,
            ColumnType::VarChar,
            ColumnType::DateTime,
            ColumnType::Uuid,
        ] {
            assert_eq!(ColumnType::from_str(ty.as_str()), Some(ty));
        }
        assert_eq!(ColumnType::from_str("varchar2"), None);
    }

    #[test]
    fn test_column_type_serde_matches_as_str() {
        let json = serde_json::to_string(&ColumnType::DateTime).unwrap();
        assert_eq!(json, "\"date_time\"");
    }

    #[test]
    fn test_column_type_categories() {
        assert!(ColumnType::BigInt.is_integer());
        assert!(ColumnType::Decimal.is_numeric());
        assert!(!ColumnType::Decimal.is_integer());
        assert!(ColumnType::Text.is_textual());
        assert!(!ColumnType::Json.is_textual());
    }

    #[test]
    fn test_referential_action() {
        assert_eq!(
            ReferentialAction::from_str("SetNull"),
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(ReferentialAction::Cascade.as_str(), "CASCADE");
        let json = serde_json::to_string(&ReferentialAction::SetNull).unwrap();
        assert_eq!(json, "\"SET_NULL\"");
    }
}
