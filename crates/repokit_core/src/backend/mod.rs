//! Persistence backend contract.
//!
//! # Responsibility
//! - Define the storage primitives the repository core is written against.
//! - Keep engine details (SQL dialect, transactions) behind one trait.
//!
//! # Invariants
//! - Every method is one backend round-trip from the repository's view.
//! - `insert_many` is all-or-nothing.
//! - Inputs reaching a backend were validated against the entity schema.

use crate::model::attributes::AttributeMap;
use crate::model::entity::{EntityId, EntitySchema};
use crate::model::record::Record;
use crate::query::{Conditions, Query, Relations};
use crate::repo::error::RepoResult;

mod sqlite;

pub use sqlite::SqliteBackend;

/// Offset/limit slice of an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: u32,
    pub offset: u64,
}

impl Window {
    /// Window for a 1-based `page` of `per_page` rows.
    pub fn page(page: u32, per_page: u32) -> Self {
        Self {
            limit: per_page,
            offset: u64::from(page.saturating_sub(1)) * u64::from(per_page),
        }
    }
}

/// Storage engine primitives.
pub trait Backend {
    /// Verifies the entity table, its columns and related tables exist.
    fn ensure_ready(&self, schema: &EntitySchema) -> RepoResult<()>;

    /// Filtered, eager-loaded, optionally ordered and windowed read.
    fn select(
        &self,
        schema: &EntitySchema,
        query: &Query,
        window: Option<Window>,
    ) -> RepoResult<Vec<Record>>;

    fn count(&self, schema: &EntitySchema, conditions: &Conditions) -> RepoResult<u64>;

    fn exists(&self, schema: &EntitySchema, conditions: &Conditions) -> RepoResult<bool>;

    fn find_by_id(
        &self,
        schema: &EntitySchema,
        id: EntityId,
        relations: &Relations,
    ) -> RepoResult<Option<Record>>;

    /// Inserts one row and returns it as persisted (generated id, defaults).
    fn insert_one(&self, schema: &EntitySchema, values: &AttributeMap) -> RepoResult<Record>;

    /// Inserts all rows atomically.
    fn insert_many(&self, schema: &EntitySchema, rows: &[AttributeMap]) -> RepoResult<bool>;

    /// Writes `values` to one row and returns it refreshed, or `None` when
    /// the row does not exist. Constraint violations fail the call.
    fn update_by_id(
        &self,
        schema: &EntitySchema,
        id: EntityId,
        values: &AttributeMap,
    ) -> RepoResult<Option<Record>>;

    /// Writes `values` to every matching row; returns affected row count.
    fn update_by_filter(
        &self,
        schema: &EntitySchema,
        conditions: &Conditions,
        values: &AttributeMap,
    ) -> RepoResult<usize>;

    fn delete_by_id(&self, schema: &EntitySchema, id: EntityId) -> RepoResult<bool>;

    /// Deletes every matching row; returns affected row count.
    fn delete_by_filter(&self, schema: &EntitySchema, conditions: &Conditions)
        -> RepoResult<usize>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn ensure_ready(&self, schema: &EntitySchema) -> RepoResult<()> {
        (**self).ensure_ready(schema)
    }

    fn select(
        &self,
        schema: &EntitySchema,
        query: &Query,
        window: Option<Window>,
    ) -> RepoResult<Vec<Record>> {
        (**self).select(schema, query, window)
    }

    fn count(&self, schema: &EntitySchema, conditions: &Conditions) -> RepoResult<u64> {
        (**self).count(schema, conditions)
    }

    fn exists(&self, schema: &EntitySchema, conditions: &Conditions) -> RepoResult<bool> {
        (**self).exists(schema, conditions)
    }

    fn find_by_id(
        &self,
        schema: &EntitySchema,
        id: EntityId,
        relations: &Relations,
    ) -> RepoResult<Option<Record>> {
        (**self).find_by_id(schema, id, relations)
    }

    fn insert_one(&self, schema: &EntitySchema, values: &AttributeMap) -> RepoResult<Record> {
        (**self).insert_one(schema, values)
    }

    fn insert_many(&self, schema: &EntitySchema, rows: &[AttributeMap]) -> RepoResult<bool> {
        (**self).insert_many(schema, rows)
    }

    fn update_by_id(
        &self,
        schema: &EntitySchema,
        id: EntityId,
        values: &AttributeMap,
    ) -> RepoResult<Option<Record>> {
        (**self).update_by_id(schema, id, values)
    }

    fn update_by_filter(
        &self,
        schema: &EntitySchema,
        conditions: &Conditions,
        values: &AttributeMap,
    ) -> RepoResult<usize> {
        (**self).update_by_filter(schema, conditions, values)
    }

    fn delete_by_id(&self, schema: &EntitySchema, id: EntityId) -> RepoResult<bool> {
        (**self).delete_by_id(schema, id)
    }

    fn delete_by_filter(
        &self,
        schema: &EntitySchema,
        conditions: &Conditions,
    ) -> RepoResult<usize> {
        (**self).delete_by_filter(schema, conditions)
    }
}
