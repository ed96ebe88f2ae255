//! Generic repository contract and its backend-driven implementation.
//!
//! # Responsibility
//! - Provide CRUD, upsert and batch operations for any [`Entity`] type.
//! - Keep timestamp stamping and partial-update merging in one place.
//!
//! # Invariants
//! - Each operation issues at most two backend calls (`update_or_create`'s
//!   update branch included) and holds no state between calls.
//! - `get`/`paginate` apply the default ordering; `first`, `count`, `exists`
//!   and batch operations never order.
//! - Updates only write attributes present in the patch and never `id`.
//! - All rows of one `batch_insert` share a single clock reading.

use crate::backend::{Backend, SqliteBackend, Window};
use crate::clock::{Clock, SystemClock};
use crate::config::RepoConfig;
use crate::model::attributes::{AttributeMap, Attributes};
use crate::model::entity::{Entity, EntityId, EntitySchema};
use crate::model::record::Record;
use crate::query::assembly::{validate_conditions, validate_write_values};
use crate::query::{Conditions, Query, Relations, Sort};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::page::{Page, PageRequest};
use log::{debug, warn};
use std::marker::PhantomData;
use std::time::Instant;

/// Data-access contract for one entity type.
pub trait Repository<E: Entity> {
    /// Persists a new row and returns it as stored (generated id, timestamps).
    fn create<A: Attributes + ?Sized>(&self, attributes: &A) -> RepoResult<E>;

    /// All matching entities, eager-loaded and ordered (default: newest first).
    fn get(
        &self,
        conditions: Option<&Conditions>,
        relations: &Relations,
        sort: Option<&Sort>,
    ) -> RepoResult<Vec<E>>;

    /// Same filtering and ordering as [`Repository::get`], sliced into pages.
    fn paginate(
        &self,
        conditions: Option<&Conditions>,
        relations: &Relations,
        page: PageRequest,
        sort: Option<&Sort>,
    ) -> RepoResult<Page<E>>;

    fn find_by_id(&self, id: EntityId, relations: &Relations) -> RepoResult<Option<E>>;

    /// Like [`Repository::find_by_id`] but absence is `NotFound`.
    fn find_by_id_or_fail(&self, id: EntityId, relations: &Relations) -> RepoResult<E> {
        self.find_by_id(id, relations)?.ok_or(RepoError::NotFound {
            table: E::SCHEMA.table,
            id: Some(id),
        })
    }

    /// First match without any ordering. Unlike `get`, the default
    /// newest-first order is not applied, so among several matches the
    /// returned row is unspecified; use `get` with a `Sort` when it matters.
    fn first(&self, conditions: Option<&Conditions>, relations: &Relations)
        -> RepoResult<Option<E>>;

    fn first_or_fail(&self, conditions: Option<&Conditions>, relations: &Relations) -> RepoResult<E> {
        self.first(conditions, relations)?.ok_or(RepoError::NotFound {
            table: E::SCHEMA.table,
            id: None,
        })
    }

    fn count(&self, conditions: Option<&Conditions>) -> RepoResult<u64>;

    fn exists(&self, conditions: Option<&Conditions>) -> RepoResult<bool>;

    /// Merges the attributes present in `values` into row `id`.
    fn update<A: Attributes + ?Sized>(&self, id: EntityId, values: &A) -> RepoResult<E>;

    /// Returns the row matching `attributes` unchanged, or creates one from
    /// `attributes` ∪ `values` (`values` win on conflict).
    fn first_or_create<A, V>(&self, attributes: &A, values: &V) -> RepoResult<E>
    where
        A: Attributes + ?Sized,
        V: Attributes + ?Sized;

    /// Merges `values` into the row matching `attributes`, or creates one from
    /// `attributes` ∪ `values`.
    fn update_or_create<A, V>(&self, attributes: &A, values: &V) -> RepoResult<E>
    where
        A: Attributes + ?Sized,
        V: Attributes + ?Sized;

    /// Deletes row `id`; absence is `NotFound`.
    fn delete_by_id(&self, id: EntityId) -> RepoResult<bool>;

    /// Inserts every row in one atomic backend call.
    fn batch_insert<A: Attributes>(&self, rows: &[A]) -> RepoResult<bool>;

    /// Merges `values` into every matching row; returns affected row count.
    fn batch_update<A: Attributes + ?Sized>(
        &self,
        conditions: &Conditions,
        values: &A,
    ) -> RepoResult<usize>;

    /// Deletes every matching row; returns affected row count.
    fn batch_delete(&self, conditions: &Conditions) -> RepoResult<usize>;
}

/// [`Repository`] implementation for entity `E` over backend `B`.
pub struct EntityRepository<E, B, C = SystemClock> {
    schema: EntitySchema,
    backend: B,
    clock: C,
    config: RepoConfig,
    _entity: PhantomData<fn() -> E>,
}

/// Repository over a borrowed SQLite connection.
pub type SqliteRepository<'conn, E, C = SystemClock> = EntityRepository<E, SqliteBackend<'conn>, C>;

impl<E: Entity, B: Backend> EntityRepository<E, B, SystemClock> {
    /// Builds a repository using the wall clock.
    ///
    /// # Errors
    /// - `InvalidArgument` when `E::SCHEMA` has malformed identifiers.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` when the backend
    ///   schema does not match.
    pub fn try_new(backend: B) -> RepoResult<Self> {
        Self::with_clock(backend, SystemClock)
    }
}

impl<E: Entity, B: Backend, C: Clock> EntityRepository<E, B, C> {
    /// Builds a repository with an injected clock.
    pub fn with_clock(backend: B, clock: C) -> RepoResult<Self> {
        E::SCHEMA.validate()?;
        backend.ensure_ready(&E::SCHEMA)?;
        Ok(Self {
            schema: E::SCHEMA,
            backend,
            clock,
            config: RepoConfig::default(),
            _entity: PhantomData,
        })
    }

    pub fn with_config(mut self, config: RepoConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn logged<T>(&self, event: &'static str, run: impl FnOnce() -> RepoResult<T>) -> RepoResult<T> {
        let started_at = Instant::now();
        let result = run();
        match &result {
            Ok(_) => debug!(
                "event={} module=repo status=ok table={} duration_ms={}",
                event,
                self.schema().table,
                started_at.elapsed().as_millis()
            ),
            Err(err) if err.is_not_found() => debug!(
                "event={} module=repo status=not_found table={} duration_ms={}",
                event,
                self.schema().table,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event={} module=repo status=error table={} duration_ms={} error={}",
                event,
                self.schema().table,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn decode_all(records: &[Record]) -> RepoResult<Vec<E>> {
        records.iter().map(E::from_record).collect()
    }

    fn not_found(&self, id: EntityId) -> RepoError {
        RepoError::NotFound {
            table: self.schema().table,
            id: Some(id),
        }
    }

    fn first_record(&self, conditions: &Conditions) -> RepoResult<Option<Record>> {
        let query = Query::assemble(self.schema(), Some(conditions), None, None)?;
        let window = Window {
            limit: 1,
            offset: 0,
        };
        Ok(self
            .backend
            .select(self.schema(), &query, Some(window))?
            .into_iter()
            .next())
    }

    /// Inserts `values`, filling timestamp columns the caller left unset.
    fn insert_entity(&self, mut values: AttributeMap) -> RepoResult<E> {
        validate_write_values(self.schema(), &values, true)?;

        if self.schema().is_timestamped() {
            let now = self.clock.now_ms();
            let stamp_columns = [
                self.schema().created_at_column(),
                self.schema().updated_at_column(),
            ];
            for column in stamp_columns.into_iter().flatten() {
                if !values.contains(column) {
                    values.insert(column, now);
                }
            }
        }

        let record = self.backend.insert_one(self.schema(), &values)?;
        E::from_record(&record)
    }

    /// Writes the attributes of `values` that differ from `current`.
    fn apply_update(&self, current: Record, values: AttributeMap) -> RepoResult<E> {
        validate_write_values(self.schema(), &values, false)?;

        let id = current.id()?;
        let mut dirty: AttributeMap = values
            .into_iter()
            .filter(|(column, value)| {
                !current
                    .get(column)
                    .is_some_and(|stored| stored.is_equivalent(value))
            })
            .collect();
        if dirty.is_empty() {
            return E::from_record(&current);
        }

        if let Some(column) = self.schema().updated_at_column() {
            if !dirty.contains(column) {
                dirty.insert(column, self.clock.now_ms());
            }
        }

        let record = self
            .backend
            .update_by_id(self.schema(), id, &dirty)?
            .ok_or_else(|| self.not_found(id))?;
        E::from_record(&record)
    }
}

impl<E: Entity, B: Backend, C: Clock> Repository<E> for EntityRepository<E, B, C> {
    fn create<A: Attributes + ?Sized>(&self, attributes: &A) -> RepoResult<E> {
        self.logged("repo_create", || self.insert_entity(attributes.to_map()))
    }

    fn get(
        &self,
        conditions: Option<&Conditions>,
        relations: &Relations,
        sort: Option<&Sort>,
    ) -> RepoResult<Vec<E>> {
        self.logged("repo_get", || {
            let sort = sort.cloned().unwrap_or_default();
            let query = Query::assemble(self.schema(), conditions, Some(relations), Some(&sort))?;
            let records = self.backend.select(self.schema(), &query, None)?;
            Self::decode_all(&records)
        })
    }

    fn paginate(
        &self,
        conditions: Option<&Conditions>,
        relations: &Relations,
        page: PageRequest,
        sort: Option<&Sort>,
    ) -> RepoResult<Page<E>> {
        self.logged("repo_paginate", || {
            let sort = sort.cloned().unwrap_or_default();
            let query = Query::assemble(self.schema(), conditions, Some(relations), Some(&sort))?;
            let per_page = self.config.normalize_page_size(page.per_page);
            let current_page = page.normalized_page();

            let total = self.backend.count(self.schema(), &query.conditions)?;
            let records = self.backend.select(
                self.schema(),
                &query,
                Some(Window::page(current_page, per_page)),
            )?;

            Ok(Page {
                items: Self::decode_all(&records)?,
                total,
                per_page,
                current_page,
            })
        })
    }

    fn find_by_id(&self, id: EntityId, relations: &Relations) -> RepoResult<Option<E>> {
        self.logged("repo_find_by_id", || {
            let query = Query::assemble(self.schema(), None, Some(relations), None)?;
            self.backend
                .find_by_id(self.schema(), id, &query.relations)?
                .map(|record| E::from_record(&record))
                .transpose()
        })
    }

    fn first(
        &self,
        conditions: Option<&Conditions>,
        relations: &Relations,
    ) -> RepoResult<Option<E>> {
        self.logged("repo_first", || {
            let query = Query::assemble(self.schema(), conditions, Some(relations), None)?;
            let window = Window {
                limit: 1,
                offset: 0,
            };
            self.backend
                .select(self.schema(), &query, Some(window))?
                .first()
                .map(E::from_record)
                .transpose()
        })
    }

    fn count(&self, conditions: Option<&Conditions>) -> RepoResult<u64> {
        self.logged("repo_count", || {
            let query = Query::assemble(self.schema(), conditions, None, None)?;
            self.backend.count(self.schema(), &query.conditions)
        })
    }

    fn exists(&self, conditions: Option<&Conditions>) -> RepoResult<bool> {
        self.logged("repo_exists", || {
            let query = Query::assemble(self.schema(), conditions, None, None)?;
            self.backend.exists(self.schema(), &query.conditions)
        })
    }

    fn update<A: Attributes + ?Sized>(&self, id: EntityId, values: &A) -> RepoResult<E> {
        self.logged("repo_update", || {
            let values = values.to_map();
            validate_write_values(self.schema(), &values, false)?;
            let current = self
                .backend
                .find_by_id(self.schema(), id, &Relations::none())?
                .ok_or_else(|| self.not_found(id))?;
            self.apply_update(current, values)
        })
    }

    fn first_or_create<A, V>(&self, attributes: &A, values: &V) -> RepoResult<E>
    where
        A: Attributes + ?Sized,
        V: Attributes + ?Sized,
    {
        self.logged("repo_first_or_create", || {
            let attributes = attributes.to_map();
            let values = values.to_map();
            validate_write_values(self.schema(), &values, true)?;

            match self.first_record(&Conditions::from(attributes.clone()))? {
                Some(existing) => E::from_record(&existing),
                None => self.insert_entity(attributes.merged(&values)),
            }
        })
    }

    fn update_or_create<A, V>(&self, attributes: &A, values: &V) -> RepoResult<E>
    where
        A: Attributes + ?Sized,
        V: Attributes + ?Sized,
    {
        self.logged("repo_update_or_create", || {
            let attributes = attributes.to_map();
            let values = values.to_map();
            validate_write_values(self.schema(), &values, false)?;

            match self.first_record(&Conditions::from(attributes.clone()))? {
                Some(existing) => self.apply_update(existing, values),
                None => self.insert_entity(attributes.merged(&values)),
            }
        })
    }

    fn delete_by_id(&self, id: EntityId) -> RepoResult<bool> {
        self.logged("repo_delete_by_id", || {
            if self
                .backend
                .find_by_id(self.schema(), id, &Relations::none())?
                .is_none()
            {
                return Err(self.not_found(id));
            }
            self.backend.delete_by_id(self.schema(), id)
        })
    }

    fn batch_insert<A: Attributes>(&self, rows: &[A]) -> RepoResult<bool> {
        self.logged("repo_batch_insert", || {
            if rows.is_empty() {
                return Ok(true);
            }

            let mut maps = rows.iter().map(Attributes::to_map).collect::<Vec<_>>();
            for map in &maps {
                validate_write_values(self.schema(), map, true)?;
            }

            if self.schema().is_timestamped() {
                let now = self.clock.now_ms();
                let stamp_columns = [
                    self.schema().created_at_column(),
                    self.schema().updated_at_column(),
                ];
                for map in &mut maps {
                    for column in stamp_columns.into_iter().flatten() {
                        map.insert(column, now);
                    }
                }
            }

            self.backend.insert_many(self.schema(), &maps)
        })
    }

    fn batch_update<A: Attributes + ?Sized>(
        &self,
        conditions: &Conditions,
        values: &A,
    ) -> RepoResult<usize> {
        self.logged("repo_batch_update", || {
            let mut values = values.to_map();
            validate_conditions(self.schema(), conditions)?;
            validate_write_values(self.schema(), &values, false)?;

            if let Some(column) = self.schema().updated_at_column() {
                if !values.contains(column) {
                    values.insert(column, self.clock.now_ms());
                }
            }
            if values.is_empty() {
                return Ok(0);
            }

            self.backend
                .update_by_filter(self.schema(), conditions, &values)
        })
    }

    fn batch_delete(&self, conditions: &Conditions) -> RepoResult<usize> {
        self.logged("repo_batch_delete", || {
            validate_conditions(self.schema(), conditions)?;
            self.backend.delete_by_filter(self.schema(), conditions)
        })
    }
}
