//! Repository error taxonomy.
//!
//! # Invariants
//! - Absence is only an error on identity-required and `*_or_fail` paths.
//! - Backend failures are surfaced unchanged, never retried.

use crate::db::DbError;
use crate::model::entity::EntityId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by every repository and backend operation.
#[derive(Debug)]
pub enum RepoError {
    /// No record matched. `id` is set for identity lookups.
    NotFound {
        table: &'static str,
        id: Option<EntityId>,
    },
    /// Backend rejected the operation (constraint violation, I/O, ...).
    Persistence(DbError),
    /// Malformed condition/sort/relation input or unknown column.
    InvalidArgument(String),
    /// Persisted row cannot be decoded into the entity type.
    InvalidData(String),
    /// Required table is missing from the connection schema.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Persistence(err) => err.is_constraint_violation(),
            _ => false,
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { table, id: Some(id) } => write!(f, "{table} record not found: {id}"),
            Self::NotFound { table, id: None } => write!(f, "no matching {table} record"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidArgument(_) => None,
            Self::InvalidData(_) => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Persistence(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(DbError::Sqlite(value))
    }
}
