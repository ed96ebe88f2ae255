//! Paged read models.

/// Requested page. `page` is 1-based; 0 is treated as 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    /// `None` or `Some(0)` use the configured default page size.
    pub per_page: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, per_page: Option<u32>) -> Self {
        Self { page, per_page }
    }

    pub(crate) fn normalized_page(&self) -> u32 {
        self.page.max(1)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: None,
        }
    }
}

/// One page of an ordered result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching rows across all pages.
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
}

impl<T> Page<T> {
    /// Last page number; an empty result still has page 1.
    pub fn last_page(&self) -> u32 {
        if self.per_page == 0 || self.total == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }
}

#[cfg(test)]
mod tests {
    use super::{Page, PageRequest};

    fn page(total: u64, per_page: u32, current_page: u32) -> Page<()> {
        Page {
            items: Vec::new(),
            total,
            per_page,
            current_page,
        }
    }

    #[test]
    fn last_page_rounds_up_and_never_drops_below_one() {
        assert_eq!(page(0, 10, 1).last_page(), 1);
        assert_eq!(page(10, 10, 1).last_page(), 1);
        assert_eq!(page(11, 10, 1).last_page(), 2);
        assert!(page(11, 10, 1).has_more_pages());
        assert!(!page(11, 10, 2).has_more_pages());
    }

    #[test]
    fn page_zero_is_first_page() {
        assert_eq!(PageRequest::new(0, None).normalized_page(), 1);
        assert_eq!(PageRequest::default().normalized_page(), 1);
    }
}
