//! Repository configuration.
//!
//! Deserializable with per-field defaults so applications can embed it in
//! their own config files.

use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Page size used when `paginate` gets none (or 0).
    pub default_page_size: u32,
    /// Optional upper bound for caller-supplied page sizes. `None` honours
    /// whatever the caller asks for.
    pub max_page_size: Option<u32>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
        }
    }
}

impl RepoConfig {
    /// Resolves the effective page size: absent or 0 means default, anything
    /// else is taken as given unless `max_page_size` is set. Never returns 0.
    pub fn normalize_page_size(&self, requested: Option<u32>) -> u32 {
        let size = match requested {
            Some(0) | None => self.default_page_size.max(1),
            Some(value) => value,
        };
        match self.max_page_size {
            Some(max) => size.min(max.max(1)),
            None => size,
        }
    }
}
