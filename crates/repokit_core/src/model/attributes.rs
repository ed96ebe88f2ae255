//! Flat attribute maps and partial-update fields.
//!
//! # Responsibility
//! - Provide the `to_map()` shape used by every write path.
//! - Keep "field omitted" distinct from "field set to null" in patches.
//!
//! # Invariants
//! - Keys are ordered by attribute name, so generated SQL is deterministic.
//! - A key that is absent was not given; `Value::Null` means "set to null".

use crate::model::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Ordered mapping of attribute name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap(BTreeMap<String, Value>);

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Copies every entry of `other` into `self`; `other` wins on conflict.
    pub fn merge(&mut self, other: &AttributeMap) {
        for (name, value) in other.iter() {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Returns the union of both maps; `other` wins on conflict.
    pub fn merged(&self, other: &AttributeMap) -> AttributeMap {
        let mut union = self.clone();
        union.merge(other);
        union
    }
}

impl FromIterator<(String, Value)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for AttributeMap {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Conversion of an entity or patch into a flat attribute map for writes.
///
/// Patch types must only emit attributes the caller explicitly set.
pub trait Attributes {
    fn to_map(&self) -> AttributeMap;
}

impl Attributes for AttributeMap {
    fn to_map(&self) -> AttributeMap {
        self.clone()
    }
}

impl<T: Attributes + ?Sized> Attributes for &T {
    fn to_map(&self) -> AttributeMap {
        (**self).to_map()
    }
}

/// One field of a partial-update payload.
///
/// Use `Field<Option<T>>` for nullable columns: `Set(None)` writes null,
/// `Omitted` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field<T> {
    #[default]
    Omitted,
    Set(T),
}

impl<T> Field<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            Self::Omitted => None,
        }
    }
}

impl<T: Clone + Into<Value>> Field<T> {
    /// Writes the value under `name` only when the field was set.
    pub fn write_to(&self, map: &mut AttributeMap, name: &str) {
        if let Self::Set(value) = self {
            map.insert(name, value.clone());
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self::Set(value)
    }
}
