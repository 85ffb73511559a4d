//! Index descriptors.

use serde::{Deserialize, Serialize};

/// Index access method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// B-tree (default).
    #[default]
    BTree,
    /// Hash index.
    Hash,
    /// Generalized inverted index.
    Gin,
    /// Generalized search tree.
    Gist,
    /// Full-text index.
    FullText,
}

impl IndexType {
    /// Get the SQL name of the access method.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::BTree => "BTREE",
            Self::Hash => "HASH",
            Self::Gin => "GIN",
            Self::Gist => "GIST",
            Self::FullText => "FULLTEXT",
        }
    }
}

/// An index over one or more fields of a table.
///
/// Two indexes are equal when name, uniqueness, type and the ordered field
/// list all match. The comment does not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Index name; generated from the table and fields when empty.
    #[serde(default)]
    pub name: String,
    /// Logical field names, in index order.
    pub fields: Vec<String>,
    /// Access method.
    #[serde(rename = "type", default)]
    pub index_type: IndexType,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Index {
    /// Create a new index over the given fields.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: String::new(),
            fields: fields.into_iter().map(Into::into).collect(),
            index_type: IndexType::default(),
            unique: false,
            comment: None,
        }
    }

    /// Set the index name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the access method.
    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    /// Set the comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Fill in the name from the table and fields if it is empty.
    pub fn named_for(mut self, table: &str) -> Self {
        if self.name.is_empty() {
            let suffix = if self.unique { "uniq" } else { "idx" };
            self.name = format!("{}_{}_{}", table, self.fields.join("_"), suffix);
        }
        self
    }

    /// Compare everything except the name.
    pub fn same_definition(&self, other: &Self) -> bool {
        self.unique == other.unique
            && self.index_type == other.index_type
            && self.fields == other.fields
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.same_definition(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_name() {
        let idx = Index::new(["author", "created_at"]).named_for("blog_post");
        assert_eq!(idx.name, "blog_post_author_created_at_idx");

        let uniq = Index::new(["email"]).unique().named_for("user");
        assert_eq!(uniq.name, "user_email_uniq");

        let explicit = Index::new(["email"]).name("by_email").named_for("user");
        assert_eq!(explicit.name, "by_email");
    }

    #[test]
    fn test_field_order_matters() {
        let a = Index::new(["x", "y"]).name("i");
        let b = Index::new(["y", "x"]).name("i");
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_ignores_comment() {
        let a = Index::new(["x"]).name("i").comment("first");
        let b = Index::new(["x"]).name("i");
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_definition_ignores_name() {
        let a = Index::new(["x", "y"]).name("i1");
        let b = Index::new(["x", "y"]).name("i2");
        assert_ne!(a, b);
        assert!(a.same_definition(&b));
        assert!(!a.same_definition(&b.clone().unique()));
        assert!(!a.same_definition(&b.index_type(IndexType::Hash)));
    }

    #[test]
    fn test_type_serialized_as_type_key() {
        let idx = Index::new(["body"]).name("ft").index_type(IndexType::FullText);
        let value = serde_json::to_value(&idx).unwrap();
        assert_eq!(value["type"], "full_text");
    }
}
