//! Raw persisted rows.
//!
//! # Responsibility
//! - Carry backend column values plus eager-loaded related rows.
//! - Provide typed accessors used by `Entity::from_record`.
//!
//! # Invariants
//! - Accessors never coerce between text and numbers; mismatches are
//!   reported as `InvalidData` instead of being masked.

use crate::model::attributes::AttributeMap;
use crate::model::entity::{EntityId, ID_COLUMN};
use crate::model::value::Value;
use crate::repo::error::{RepoError, RepoResult};
use std::collections::BTreeMap;

/// One backend row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    table: &'static str,
    values: AttributeMap,
    relations: BTreeMap<String, Vec<Record>>,
}

impl Record {
    pub fn new(table: &'static str, values: AttributeMap) -> Self {
        Self {
            table,
            values,
            relations: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn values(&self) -> &AttributeMap {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn id(&self) -> RepoResult<EntityId> {
        self.integer(ID_COLUMN)
    }

    pub fn integer(&self, column: &str) -> RepoResult<i64> {
        self.required(column, |value| value.as_integer())
    }

    pub fn opt_integer(&self, column: &str) -> RepoResult<Option<i64>> {
        self.optional(column, |value| value.as_integer())
    }

    pub fn real(&self, column: &str) -> RepoResult<f64> {
        self.required(column, |value| value.as_real())
    }

    pub fn opt_real(&self, column: &str) -> RepoResult<Option<f64>> {
        self.optional(column, |value| value.as_real())
    }

    pub fn text(&self, column: &str) -> RepoResult<String> {
        self.required(column, |value| value.as_text().map(str::to_string))
    }

    pub fn opt_text(&self, column: &str) -> RepoResult<Option<String>> {
        self.optional(column, |value| value.as_text().map(str::to_string))
    }

    /// Reads a `0|1` integer column.
    pub fn boolean(&self, column: &str) -> RepoResult<bool> {
        match self.integer(column)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(RepoError::InvalidData(format!(
                "invalid boolean value `{other}` in {}.{column}",
                self.table
            ))),
        }
    }

    /// Related rows for `name`, or `None` when the relation was not loaded.
    pub fn related(&self, name: &str) -> Option<&[Record]> {
        self.relations.get(name).map(Vec::as_slice)
    }

    /// Single related row of a belongs-to relation.
    pub fn related_one(&self, name: &str) -> Option<&Record> {
        self.relations.get(name).and_then(|rows| rows.first())
    }

    pub fn set_related(&mut self, name: impl Into<String>, rows: Vec<Record>) {
        self.relations.insert(name.into(), rows);
    }

    fn required<T>(&self, column: &str, read: impl Fn(&Value) -> Option<T>) -> RepoResult<T> {
        match self.optional(column, read)? {
            Some(value) => Ok(value),
            None => Err(RepoError::InvalidData(format!(
                "unexpected null in {}.{column}",
                self.table
            ))),
        }
    }

    fn optional<T>(
        &self,
        column: &str,
        read: impl Fn(&Value) -> Option<T>,
    ) -> RepoResult<Option<T>> {
        let value = self.values.get(column).ok_or_else(|| {
            RepoError::InvalidData(format!("missing column {}.{column}", self.table))
        })?;
        if value.is_null() {
            return Ok(None);
        }
        read(value).map(Some).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "unexpected {} value in {}.{column}",
                value.type_name(),
                self.table
            ))
        })
    }
}
