//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// Upper bound on requested page size
pub const MAX_PER_PAGE: u32 = 100;

impl Pagination {
    /// Row offset for the current page (page numbers start at 1)
    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.limit()
    }

    /// Page size, clamped so one request cannot pull an entire history
    pub fn limit(&self) -> i64 {
        self.per_page.min(MAX_PER_PAGE) as i64
    }
}

/// Pagination metadata for a response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pagination_starts_at_first_page() {
        let p = Pagination::default();
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 20);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn offset_advances_with_page() {
        let p = Pagination {
            page: 3,
            per_page: 25,
        };
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn zero_page_is_treated_as_first() {
        let p = Pagination {
            page: 0,
            per_page: 10,
        };
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn oversized_per_page_is_clamped() {
        let p = Pagination {
            page: 1,
            per_page: u32::MAX,
        };
        assert_eq!(p.limit(), MAX_PER_PAGE as i64);

        let p = Pagination {
            page: 3,
            per_page: 10_000,
        };
        assert_eq!(p.offset(), 2 * MAX_PER_PAGE as i64);
    }
}
