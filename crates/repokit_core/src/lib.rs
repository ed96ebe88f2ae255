//! Generic typed repository layer over relational storage.
//! Application code maps entities through [`Repository`] instead of issuing
//! ad-hoc queries.

pub mod backend;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use backend::{Backend, SqliteBackend, Window};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RepoConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attributes::{AttributeMap, Attributes, Field};
pub use model::entity::{
    Entity, EntityId, EntitySchema, RelationDef, RelationKind, Timestamps, ID_COLUMN,
};
pub use model::record::Record;
pub use model::value::Value;
pub use query::{Conditions, Query, Relations, Sort};
pub use repo::entity_repo::{EntityRepository, Repository, SqliteRepository};
pub use repo::error::{RepoError, RepoResult};
pub use repo::page::{Page, PageRequest};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
