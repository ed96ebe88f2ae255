//! Sort order input.

/// Column plus direction.
///
/// `column: None` falls back to the entity's default order column. The
/// default value sorts that column descending ("most recent first").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: Option<String>,
    pub descending: bool,
}

impl Sort {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            descending: true,
        }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            column: None,
            descending: true,
        }
    }
}
