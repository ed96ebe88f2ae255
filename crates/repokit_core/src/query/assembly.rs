//! Query assembly.
//!
//! # Responsibility
//! - Combine conditions, relations and sort into one validated [`Query`].
//! - Resolve the entity's default ordering.
//!
//! # Invariants
//! - `sort = None` is the explicit "no ordering" signal; the default
//!   ordering is only applied for `Some(sort)`.
//! - Every ordered query ends with `id` so slices never overlap when the
//!   primary sort column has duplicates.

use crate::model::attributes::AttributeMap;
use crate::model::entity::{EntitySchema, ID_COLUMN};
use crate::query::condition::Conditions;
use crate::query::relation::Relations;
use crate::query::sort::Sort;
use crate::repo::error::{RepoError, RepoResult};

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub column: String,
    pub descending: bool,
}

/// Fully resolved read query for one entity table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub conditions: Conditions,
    pub relations: Relations,
    /// Empty means unordered.
    pub ordering: Vec<OrderKey>,
}

impl Query {
    /// Builds a query: filters, then eager loads, then ordering.
    ///
    /// # Errors
    /// - `InvalidArgument` for unknown condition/sort columns or relation names.
    pub fn assemble(
        schema: &EntitySchema,
        conditions: Option<&Conditions>,
        relations: Option<&Relations>,
        sort: Option<&Sort>,
    ) -> RepoResult<Self> {
        let mut query = Query::default();

        if let Some(conditions) = conditions {
            validate_conditions(schema, conditions)?;
            query.conditions = conditions.clone();
        }

        if let Some(relations) = relations {
            validate_relations(schema, relations)?;
            query.relations = relations.clone();
        }

        if let Some(sort) = sort {
            query.ordering = resolve_ordering(schema, sort)?;
        }

        Ok(query)
    }

    pub fn is_ordered(&self) -> bool {
        !self.ordering.is_empty()
    }
}

/// Rejects filters on columns the entity does not declare.
pub fn validate_conditions(schema: &EntitySchema, conditions: &Conditions) -> RepoResult<()> {
    for (column, _) in conditions.iter() {
        if !schema.has_column(column) {
            return Err(RepoError::invalid_argument(format!(
                "unknown condition column `{column}` for table `{}`",
                schema.table
            )));
        }
    }
    Ok(())
}

/// Rejects relation names the entity does not declare.
pub fn validate_relations(schema: &EntitySchema, relations: &Relations) -> RepoResult<()> {
    for name in relations.iter() {
        if schema.relation(name).is_none() {
            return Err(RepoError::invalid_argument(format!(
                "unknown relation `{name}` for table `{}`",
                schema.table
            )));
        }
    }
    Ok(())
}

/// Rejects write payloads naming unknown columns, or `id` when identity is
/// fixed (every update path).
pub fn validate_write_values(
    schema: &EntitySchema,
    values: &AttributeMap,
    allow_id: bool,
) -> RepoResult<()> {
    for column in values.keys() {
        if column == ID_COLUMN && !allow_id {
            return Err(RepoError::invalid_argument(format!(
                "`{ID_COLUMN}` of table `{}` cannot be changed",
                schema.table
            )));
        }
        if !schema.has_column(column) {
            return Err(RepoError::invalid_argument(format!(
                "unknown column `{column}` for table `{}`",
                schema.table
            )));
        }
    }
    Ok(())
}

fn resolve_ordering(schema: &EntitySchema, sort: &Sort) -> RepoResult<Vec<OrderKey>> {
    let column = match sort.column.as_deref() {
        Some(column) if schema.has_column(column) => column,
        Some(column) => {
            return Err(RepoError::invalid_argument(format!(
                "unknown sort column `{column}` for table `{}`",
                schema.table
            )));
        }
        None => schema.default_order_column(),
    };

    let mut keys = vec![OrderKey {
        column: column.to_string(),
        descending: sort.descending,
    }];
    if column != ID_COLUMN {
        keys.push(OrderKey {
            column: ID_COLUMN.to_string(),
            descending: sort.descending,
        });
    }
    Ok(keys)
}
