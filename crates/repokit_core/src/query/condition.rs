//! Equality-conjunction filters.

use crate::model::attributes::{AttributeMap, Attributes};
use crate::model::value::Value;

/// AND of `attribute = value` filters. Empty means "no filtering".
///
/// A `Null` value matches rows where the attribute IS NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions(AttributeMap);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses every attribute the source emits as one equality filter.
    pub fn from_attributes<A: Attributes + ?Sized>(source: &A) -> Self {
        Self(source.to_map())
    }

    /// Adds `attribute = value`, replacing an earlier filter on the same attribute.
    pub fn eq(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(attribute, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn as_map(&self) -> &AttributeMap {
        &self.0
    }
}

impl From<AttributeMap> for Conditions {
    fn from(value: AttributeMap) -> Self {
        Self(value)
    }
}
