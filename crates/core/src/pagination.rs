//! Page arithmetic for listing endpoints.
//!
//! Pages are 1-based. Page `p` of size `n` covers the inclusive row range
//! `(p - 1) * n ..= p * n - 1`, which maps onto the backend's
//! `offset`/`limit` parameters.

use serde::{Deserialize, Serialize};

/// A requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Rows per page.
    pub size: u32,
}

impl PageRequest {
    /// Default rows per page for listings.
    pub const DEFAULT_SIZE: u32 = 20;
    /// Upper bound on rows per page.
    pub const MAX_SIZE: u32 = 100;

    /// Build a page request, clamping to valid values.
    ///
    /// Page 0 becomes page 1; size is clamped to `1..=MAX_SIZE`.
    #[must_use]
    pub fn new(page: Option<u32>, size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            size: size
                .unwrap_or(Self::DEFAULT_SIZE)
                .clamp(1, Self::MAX_SIZE),
        }
    }

    /// Row offset of the first row on this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }

    /// Inclusive `(first, last)` row range.
    #[must_use]
    pub fn range(&self) -> (u64, u64) {
        let first = self.offset();
        (first, first + u64::from(self.size) - 1)
    }

    /// Number of pages needed for `total` rows.
    #[must_use]
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.size))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Rows matching the query across all pages.
    pub total_count: u64,
    /// The page that was returned.
    pub current_page: u32,
    /// Pages available for `total_count`.
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    /// Assemble a page from rows and the exact count.
    #[must_use]
    pub fn new(items: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        Self {
            items,
            total_count,
            current_page: request.page,
            total_pages: request.total_pages(total_count),
        }
    }
}
