//! Eager-load relation sets.

/// Ordered, de-duplicated set of relation names to load with each entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations(Vec<String>);

impl Relations {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .fold(Self::default(), |relations, name| relations.with(name))
    }

    /// Appends `name` unless already present.
    pub fn with(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.0.contains(&name) {
            self.0.push(name);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::Relations;

    #[test]
    fn keeps_first_insertion_order_without_duplicates() {
        let relations = Relations::of(["comments", "author", "comments"]);
        assert_eq!(relations.iter().collect::<Vec<_>>(), vec!["comments", "author"]);
        assert!(Relations::none().is_empty());
    }
}
