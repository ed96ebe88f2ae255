//! Query inputs and their assembly into one backend query.
//!
//! # Responsibility
//! - Model condition, relation and sort inputs.
//! - Validate them against the entity schema before any backend call.
//!
//! # Invariants
//! - Only equality conjunctions are expressible.
//! - Aggregate/existence/batch paths never carry an ordering.

pub mod assembly;
pub mod condition;
pub mod relation;
pub mod sort;

pub use assembly::{OrderKey, Query};
pub use condition::Conditions;
pub use relation::Relations;
pub use sort::Sort;
