//! SQLite implementation of [`Backend`].
//!
//! # Responsibility
//! - Render validated queries into parameterised SQL.
//! - Eager-load relations with one `IN (...)` query per relation.
//!
//! # Invariants
//! - Values are always bound, never interpolated.
//! - Identifiers are double-quoted and come from a validated `EntitySchema`.
//! - `insert_many` runs inside a savepoint, so it stays atomic inside an
//!   outer caller transaction too.

use super::{Backend, Window};
use crate::model::attributes::AttributeMap;
use crate::model::entity::{EntityId, EntitySchema, RelationDef, RelationKind, ID_COLUMN};
use crate::model::record::Record;
use crate::model::value::Value;
use crate::query::{Conditions, OrderKey, Query, Relations};
use crate::repo::error::{RepoError, RepoResult};
use log::warn;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, Row, ToSql};
use std::collections::{BTreeMap, BTreeSet};

const INSERT_MANY_SAVEPOINT: &str = "repokit_insert_many";
/// Keeps `IN (...)` lists under SQLite's host parameter limit.
const IN_LIST_CHUNK: usize = 500;

/// Backend over a borrowed, migrated SQLite connection.
pub struct SqliteBackend<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBackend<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    fn query_records(
        &self,
        table: &'static str,
        sql: &str,
        binds: &[Value],
    ) -> RepoResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.query(params_from_iter(binds.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(read_record(table, &columns, row)?);
        }
        Ok(records)
    }

    fn load_relations(
        &self,
        schema: &EntitySchema,
        relations: &Relations,
        records: &mut [Record],
    ) -> RepoResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        for name in relations.iter() {
            let relation = schema.relation(name).ok_or_else(|| {
                RepoError::InvalidArgument(format!(
                    "unknown relation `{name}` for table `{}`",
                    schema.table
                ))
            })?;
            match relation.kind {
                RelationKind::HasMany => self.load_has_many(relation, records)?,
                RelationKind::BelongsTo => self.load_belongs_to(relation, records)?,
            }
        }
        Ok(())
    }

    fn load_has_many(&self, relation: &RelationDef, records: &mut [Record]) -> RepoResult<()> {
        let owner_ids = records
            .iter()
            .map(Record::id)
            .collect::<RepoResult<BTreeSet<_>>>()?;

        let mut grouped: BTreeMap<EntityId, Vec<Record>> = BTreeMap::new();
        for related in self.fetch_in(relation.table, relation.foreign_key, &owner_ids)? {
            if let Some(owner_id) = related.opt_integer(relation.foreign_key)? {
                grouped.entry(owner_id).or_default().push(related);
            }
        }

        for record in records.iter_mut() {
            let rows = grouped.get(&record.id()?).cloned().unwrap_or_default();
            record.set_related(relation.name, rows);
        }
        Ok(())
    }

    fn load_belongs_to(&self, relation: &RelationDef, records: &mut [Record]) -> RepoResult<()> {
        let mut target_ids = BTreeSet::new();
        for record in records.iter() {
            target_ids.extend(record.opt_integer(relation.foreign_key)?);
        }

        let mut by_id: BTreeMap<EntityId, Record> = BTreeMap::new();
        for related in self.fetch_in(relation.table, ID_COLUMN, &target_ids)? {
            by_id.insert(related.id()?, related);
        }

        for record in records.iter_mut() {
            let rows = match record.opt_integer(relation.foreign_key)? {
                Some(target_id) => by_id.get(&target_id).cloned().into_iter().collect(),
                None => Vec::new(),
            };
            record.set_related(relation.name, rows);
        }
        Ok(())
    }

    fn fetch_in(
        &self,
        table: &'static str,
        column: &str,
        keys: &BTreeSet<EntityId>,
    ) -> RepoResult<Vec<Record>> {
        let keys: Vec<EntityId> = keys.iter().copied().collect();
        let mut records = Vec::new();
        for chunk in keys.chunks(IN_LIST_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT * FROM {} WHERE {} IN ({placeholders}) ORDER BY {} ASC;",
                quote(table),
                quote(column),
                quote(ID_COLUMN)
            );
            let binds: Vec<Value> = chunk.iter().map(|key| Value::Integer(*key)).collect();
            records.extend(self.query_records(table, &sql, &binds)?);
        }
        Ok(records)
    }

    fn insert_rows(&self, schema: &EntitySchema, rows: &[AttributeMap]) -> RepoResult<()> {
        for row in rows {
            let (sql, binds) = insert_sql(schema.table, row, false);
            let mut stmt = self.conn.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(binds.iter()))?;
        }
        Ok(())
    }

    fn ensure_table(&self, table: &'static str, columns: &[&'static str]) -> RepoResult<()> {
        if !table_exists(self.conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        let existing = table_columns(self.conn, table)?;
        for &column in columns {
            if !existing.iter().any(|current| current.as_str() == column) {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
        Ok(())
    }
}

impl Backend for SqliteBackend<'_> {
    fn ensure_ready(&self, schema: &EntitySchema) -> RepoResult<()> {
        self.ensure_table(schema.table, &schema.all_columns())?;
        for relation in schema.relations {
            match relation.kind {
                RelationKind::HasMany => {
                    self.ensure_table(relation.table, &[ID_COLUMN, relation.foreign_key])?
                }
                RelationKind::BelongsTo => self.ensure_table(relation.table, &[ID_COLUMN])?,
            }
        }
        Ok(())
    }

    fn select(
        &self,
        schema: &EntitySchema,
        query: &Query,
        window: Option<Window>,
    ) -> RepoResult<Vec<Record>> {
        let mut binds = Vec::new();
        let mut sql = format!("SELECT * FROM {}", quote(schema.table));
        sql.push_str(&where_clause(&query.conditions, &mut binds));
        sql.push_str(&order_clause(&query.ordering));

        if let Some(window) = window {
            sql.push_str(" LIMIT ? OFFSET ?");
            binds.push(Value::Integer(i64::from(window.limit)));
            binds.push(Value::Integer(
                i64::try_from(window.offset).unwrap_or(i64::MAX),
            ));
        }
        sql.push(';');

        let mut records = self.query_records(schema.table, &sql, &binds)?;
        self.load_relations(schema, &query.relations, &mut records)?;
        Ok(records)
    }

    fn count(&self, schema: &EntitySchema, conditions: &Conditions) -> RepoResult<u64> {
        let mut binds = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {}{};",
            quote(schema.table),
            where_clause(conditions, &mut binds)
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds.iter()), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn exists(&self, schema: &EntitySchema, conditions: &Conditions) -> RepoResult<bool> {
        let mut binds = Vec::new();
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {}{});",
            quote(schema.table),
            where_clause(conditions, &mut binds)
        );
        let exists: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds.iter()), |row| row.get(0))?;
        Ok(exists == 1)
    }

    fn find_by_id(
        &self,
        schema: &EntitySchema,
        id: EntityId,
        relations: &Relations,
    ) -> RepoResult<Option<Record>> {
        let query = Query {
            conditions: Conditions::new().eq(ID_COLUMN, id),
            relations: relations.clone(),
            ordering: Vec::new(),
        };
        Ok(self.select(schema, &query, None)?.into_iter().next())
    }

    fn insert_one(&self, schema: &EntitySchema, values: &AttributeMap) -> RepoResult<Record> {
        let (sql, binds) = insert_sql(schema.table, values, true);
        self.query_records(schema.table, &sql, &binds)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RepoError::InvalidData(format!("insert into {} returned no row", schema.table))
            })
    }

    fn insert_many(&self, schema: &EntitySchema, rows: &[AttributeMap]) -> RepoResult<bool> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {INSERT_MANY_SAVEPOINT};"))?;

        match self.insert_rows(schema, rows) {
            Ok(()) => {
                self.conn
                    .execute_batch(&format!("RELEASE {INSERT_MANY_SAVEPOINT};"))?;
                Ok(true)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch(&format!(
                    "ROLLBACK TO {INSERT_MANY_SAVEPOINT}; RELEASE {INSERT_MANY_SAVEPOINT};"
                )) {
                    warn!(
                        "event=insert_many_rollback module=backend status=error table={} error={}",
                        schema.table, rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    fn update_by_id(
        &self,
        schema: &EntitySchema,
        id: EntityId,
        values: &AttributeMap,
    ) -> RepoResult<Option<Record>> {
        if values.is_empty() {
            return self.find_by_id(schema, id, &Relations::none());
        }

        let mut binds = Vec::new();
        let sql = format!(
            "UPDATE {} SET {}{} RETURNING *;",
            quote(schema.table),
            set_clause(values, &mut binds),
            where_clause(&Conditions::new().eq(ID_COLUMN, id), &mut binds)
        );
        Ok(self
            .query_records(schema.table, &sql, &binds)?
            .into_iter()
            .next())
    }

    fn update_by_filter(
        &self,
        schema: &EntitySchema,
        conditions: &Conditions,
        values: &AttributeMap,
    ) -> RepoResult<usize> {
        if values.is_empty() {
            return Ok(0);
        }

        let mut binds = Vec::new();
        let sql = format!(
            "UPDATE {} SET {}{};",
            quote(schema.table),
            set_clause(values, &mut binds),
            where_clause(conditions, &mut binds)
        );
        Ok(self.conn.execute(&sql, params_from_iter(binds.iter()))?)
    }

    fn delete_by_id(&self, schema: &EntitySchema, id: EntityId) -> RepoResult<bool> {
        let changed = self.delete_by_filter(schema, &Conditions::new().eq(ID_COLUMN, id))?;
        Ok(changed > 0)
    }

    fn delete_by_filter(
        &self,
        schema: &EntitySchema,
        conditions: &Conditions,
    ) -> RepoResult<usize> {
        let mut binds = Vec::new();
        let sql = format!(
            "DELETE FROM {}{};",
            quote(schema.table),
            where_clause(conditions, &mut binds)
        );
        Ok(self.conn.execute(&sql, params_from_iter(binds.iter()))?)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(value) => ToSqlOutput::Borrowed(ValueRef::Integer(*value)),
            Value::Real(value) => ToSqlOutput::Borrowed(ValueRef::Real(*value)),
            Value::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Value::Blob(value) => ToSqlOutput::Borrowed(ValueRef::Blob(value.as_slice())),
        })
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn where_clause(conditions: &Conditions, binds: &mut Vec<Value>) -> String {
    if conditions.is_empty() {
        return String::new();
    }

    let predicates: Vec<String> = conditions
        .iter()
        .map(|(column, value)| {
            if value.is_null() {
                format!("{} IS NULL", quote(column))
            } else {
                binds.push(value.clone());
                format!("{} = ?", quote(column))
            }
        })
        .collect();
    format!(" WHERE {}", predicates.join(" AND "))
}

fn order_clause(ordering: &[OrderKey]) -> String {
    if ordering.is_empty() {
        return String::new();
    }

    let keys: Vec<String> = ordering
        .iter()
        .map(|key| {
            let direction = if key.descending { "DESC" } else { "ASC" };
            format!("{} {direction}", quote(&key.column))
        })
        .collect();
    format!(" ORDER BY {}", keys.join(", "))
}

fn set_clause(values: &AttributeMap, binds: &mut Vec<Value>) -> String {
    values
        .iter()
        .map(|(column, value)| {
            binds.push(value.clone());
            format!("{} = ?", quote(column))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_sql(table: &str, values: &AttributeMap, returning: bool) -> (String, Vec<Value>) {
    let suffix = if returning { " RETURNING *;" } else { ";" };
    if values.is_empty() {
        return (
            format!("INSERT INTO {} DEFAULT VALUES{suffix}", quote(table)),
            Vec::new(),
        );
    }

    let columns: Vec<String> = values.keys().map(quote).collect();
    let placeholders = vec!["?"; values.len()].join(", ");
    let binds = values.iter().map(|(_, value)| value.clone()).collect();
    (
        format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}){suffix}",
            quote(table),
            columns.join(", ")
        ),
        binds,
    )
}

fn read_record(table: &'static str, columns: &[String], row: &Row<'_>) -> RepoResult<Record> {
    let mut values = AttributeMap::new();
    for (index, column) in columns.iter().enumerate() {
        let value = match row.get_ref(index)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(value) => Value::Integer(value),
            ValueRef::Real(value) => Value::Real(value),
            ValueRef::Text(bytes) => Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|_| {
                        RepoError::InvalidData(format!("non-utf8 text in {table}.{column}"))
                    })?
                    .to_string(),
            ),
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        };
        values.insert(column.clone(), value);
    }
    Ok(Record::new(table, values))
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote(table)))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
