//! Page-number pagination.

use serde::{Deserialize, Serialize};

/// A requested page, already clamped to valid bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: i64,
    limit: i64,
}

impl Page {
    /// Clamp raw query values.
    ///
    /// A missing or non-positive `page` becomes 1. A `limit` outside
    /// `1..=max_limit` becomes `default_limit`.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit
            .filter(|l| (1..=max_limit).contains(l))
            .unwrap_or(default_limit);
        Self { page, limit }
    }

    #[must_use]
    pub const fn page(&self) -> i64 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.limit
    }

    /// Rows to skip, saturating for absurd page numbers.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Pagination summary for a result set of `total` rows.
    #[must_use]
    pub const fn info(&self, total: i64) -> PageInfo {
        PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: (total + self.limit - 1) / self.limit,
        }
    }
}

/// Pagination block returned with list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}
