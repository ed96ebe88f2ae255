//! Entity descriptors.
//!
//! # Responsibility
//! - Declare the static table shape of one entity type.
//! - Define the `from_record` / `to_map` contract every entity implements.
//!
//! # Invariants
//! - `id` is the implicit integer primary key and never listed in `columns`.
//! - Identity is immutable after creation.
//! - Every identifier is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).

use crate::model::attributes::Attributes;
use crate::model::record::Record;
use crate::repo::error::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// Integer identity of a persisted entity.
pub type EntityId = i64;

/// Name of the identity column shared by every entity table.
pub const ID_COLUMN: &str = "id";

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Creation/update timestamp columns of a timestamped entity type.
///
/// Either column may be disabled with `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: Option<&'static str>,
    pub updated_at: Option<&'static str>,
}

impl Timestamps {
    /// `created_at` + `updated_at`, both epoch milliseconds.
    pub const DEFAULT: Timestamps = Timestamps {
        created_at: Some("created_at"),
        updated_at: Some("updated_at"),
    };
}

/// How a relation joins back to the owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// `related.foreign_key = owner.id`; zero or more rows.
    HasMany,
    /// `owner.foreign_key = related.id`; zero or one row.
    BelongsTo,
}

/// Named association that can be eager-loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDef {
    pub name: &'static str,
    pub kind: RelationKind,
    pub table: &'static str,
    pub foreign_key: &'static str,
}

impl RelationDef {
    pub const fn has_many(
        name: &'static str,
        table: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            kind: RelationKind::HasMany,
            table,
            foreign_key,
        }
    }

    pub const fn belongs_to(
        name: &'static str,
        table: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            kind: RelationKind::BelongsTo,
            table,
            foreign_key,
        }
    }
}

/// Static table shape of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub table: &'static str,
    /// Writable attribute columns, excluding `id` and timestamp columns.
    pub columns: &'static [&'static str],
    pub timestamps: Option<Timestamps>,
    pub relations: &'static [RelationDef],
}

impl EntitySchema {
    pub fn is_timestamped(&self) -> bool {
        self.timestamps.is_some()
    }

    pub fn created_at_column(&self) -> Option<&'static str> {
        self.timestamps.and_then(|stamps| stamps.created_at)
    }

    pub fn updated_at_column(&self) -> Option<&'static str> {
        self.timestamps.and_then(|stamps| stamps.updated_at)
    }

    /// Whether `name` is `id`, a declared column or a timestamp column.
    pub fn has_column(&self, name: &str) -> bool {
        name == ID_COLUMN
            || self.columns.contains(&name)
            || self.created_at_column() == Some(name)
            || self.updated_at_column() == Some(name)
    }

    /// Every column the backend table must carry, `id` first.
    pub fn all_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![ID_COLUMN];
        columns.extend(self.columns.iter().copied());
        columns.extend(self.created_at_column());
        columns.extend(self.updated_at_column());
        columns
    }

    /// Column used when no sort column is given: creation timestamp for
    /// timestamped types, `id` otherwise.
    pub fn default_order_column(&self) -> &'static str {
        self.created_at_column().unwrap_or(ID_COLUMN)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Rejects malformed identifiers and duplicate names.
    pub fn validate(&self) -> RepoResult<()> {
        ensure_identifier(self.table, "table")?;

        let columns = self.all_columns();
        for (index, column) in columns.iter().enumerate() {
            ensure_identifier(column, "column")?;
            if columns[..index].contains(column) {
                return Err(RepoError::invalid_argument(format!(
                    "column `{column}` declared twice for table `{}`",
                    self.table
                )));
            }
        }

        for (index, relation) in self.relations.iter().enumerate() {
            ensure_identifier(relation.name, "relation")?;
            ensure_identifier(relation.table, "table")?;
            ensure_identifier(relation.foreign_key, "column")?;
            if self.relations[..index]
                .iter()
                .any(|previous| previous.name == relation.name)
            {
                return Err(RepoError::invalid_argument(format!(
                    "relation `{}` declared twice for table `{}`",
                    relation.name, self.table
                )));
            }
            if relation.kind == RelationKind::BelongsTo && !self.has_column(relation.foreign_key)
            {
                return Err(RepoError::invalid_argument(format!(
                    "relation `{}` uses undeclared column `{}`",
                    relation.name, relation.foreign_key
                )));
            }
        }

        Ok(())
    }
}

/// Typed domain record mapped to one table row.
///
/// `to_map()` (via [`Attributes`]) feeds writes; `from_record` feeds every
/// read path, including rows returned by writes.
pub trait Entity: Attributes + Sized {
    const SCHEMA: EntitySchema;

    fn id(&self) -> EntityId;

    fn from_record(record: &Record) -> RepoResult<Self>;
}

/// Returns whether `value` is a plain SQL identifier.
pub fn is_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

fn ensure_identifier(value: &str, kind: &str) -> RepoResult<()> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(RepoError::invalid_argument(format!(
            "invalid {kind} identifier `{value}`"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{is_identifier, EntitySchema, RelationDef, Timestamps};
    use crate::repo::error::RepoError;

    const POSTS: EntitySchema = EntitySchema {
        table: "posts",
        columns: &["title", "author_id"],
        timestamps: Some(Timestamps::DEFAULT),
        relations: &[
            RelationDef::belongs_to("author", "authors", "author_id"),
            RelationDef::has_many("comments", "comments", "post_id"),
        ],
    };

    #[test]
    fn default_order_column_prefers_creation_timestamp() {
        assert_eq!(POSTS.default_order_column(), "created_at");

        let untimestamped = EntitySchema {
            timestamps: None,
            ..POSTS
        };
        assert_eq!(untimestamped.default_order_column(), "id");

        let no_created_at = EntitySchema {
            timestamps: Some(Timestamps {
                created_at: None,
                updated_at: Some("updated_at"),
            }),
            ..POSTS
        };
        assert_eq!(no_created_at.default_order_column(), "id");
    }

    #[test]
    fn has_column_covers_id_and_timestamps() {
        assert!(POSTS.has_column("id"));
        assert!(POSTS.has_column("title"));
        assert!(POSTS.has_column("updated_at"));
        assert!(!POSTS.has_column("body"));
    }

    #[test]
    fn validate_rejects_bad_identifiers_and_duplicates() {
        POSTS.validate().unwrap();

        let bad_column = EntitySchema {
            columns: &["title; DROP TABLE posts"],
            ..POSTS
        };
        assert!(matches!(
            bad_column.validate(),
            Err(RepoError::InvalidArgument(_))
        ));

        let duplicate = EntitySchema {
            columns: &["title", "created_at"],
            ..POSTS
        };
        assert!(matches!(
            duplicate.validate(),
            Err(RepoError::InvalidArgument(_))
        ));

        let dangling = EntitySchema {
            columns: &["title"],
            ..POSTS
        };
        assert!(matches!(
            dangling.validate(),
            Err(RepoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn identifier_check_matches_plain_names_only() {
        assert!(is_identifier("created_at"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
