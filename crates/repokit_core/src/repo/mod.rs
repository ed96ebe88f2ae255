//! Repository core.
//!
//! # Responsibility
//! - Define the generic data-access contract used by application code.
//! - Implement it once, in terms of query assembly and a [`crate::backend::Backend`].
//!
//! # Invariants
//! - Repositories are stateless between calls; no caching, no retries.
//! - Repository APIs return semantic errors (`NotFound`, `InvalidArgument`)
//!   in addition to backend persistence errors.

pub mod entity_repo;
pub mod error;
pub mod page;
