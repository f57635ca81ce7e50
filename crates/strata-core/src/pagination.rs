//! Pagination arithmetic for list operations.
//!
//! Pure `{page, limit, total}` bookkeeping: the repository uses it only to
//! slice list queries, it performs no caching or store access itself.

use serde::{Deserialize, Serialize};

/// Page/limit/total triple with derived offset and page bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Requested page, 1-indexed. Clamped to `[1, last_page]` on read.
    pub page: u64,
    /// Items per page. `0` means unlimited (the whole total in one page).
    pub limit: u64,
    /// Total item count across all pages. Usually filled in by the caller
    /// once a COUNT query has run.
    pub total: u64,
}

impl Pagination {
    /// The default page size.
    pub const DEFAULT_LIMIT: u64 = 1000;

    /// Creates a pagination for `page` with `limit` items per page.
    #[must_use]
    pub const fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            total: 0,
        }
    }

    /// Sets the total item count.
    #[must_use]
    pub const fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    /// Updates the total item count in place.
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    /// The effective per-page limit: the configured limit, or the whole
    /// total when unlimited.
    #[must_use]
    pub const fn effective_limit(&self) -> u64 {
        if self.limit != 0 {
            self.limit
        } else {
            self.total
        }
    }

    /// The last page number, at least 1.
    #[must_use]
    pub fn last_page(&self) -> u64 {
        if self.total > 0 && self.limit > 0 {
            self.total.div_ceil(self.limit)
        } else {
            1
        }
    }

    /// The current page, clamped to `[1, last_page]`.
    #[must_use]
    pub fn current_page(&self) -> u64 {
        self.page.max(1).min(self.last_page())
    }

    /// The row offset of the current page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        (self.current_page() - 1) * self.effective_limit()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}
