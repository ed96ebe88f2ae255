//! Entity descriptor model.
//!
//! # Responsibility
//! - Define values, attribute maps, raw records and the entity contract.
//!
//! # Invariants
//! - Every entity is identified by an immutable integer `id`.

pub mod attributes;
pub mod entity;
pub mod record;
pub mod value;
