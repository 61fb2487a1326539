//! Page/limit parameters and their offset arithmetic.
//!
//! This module provides:
//! - `PageRequest`, the validated `{page ≥ 1, limit ≥ 1}` pair
//! - `PageMetadata`, the computed page counts and navigation flags

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};

// ═══════════════════════════════════════════════════════════════════════════════
// Page Request
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-indexed).
    page: u32,
    /// Items per page.
    limit: u32,
}

impl PageRequest {
    /// Rejects a zero page or limit.
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page < super::MIN_PAGE_NUMBER {
            return Err(TrackError::validation("page must be a positive integer")
                .with_context("page", page));
        }
        if limit == 0 {
            return Err(TrackError::validation("limit must be a positive integer")
                .with_context("limit", limit));
        }
        Ok(Self { page, limit })
    }

    /// `page=1` with the given limit.
    pub fn first(limit: u32) -> Self {
        Self {
            page: 1,
            limit: limit.max(1),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// `(page - 1) * limit`, widened so large pages cannot overflow.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn is_first(&self) -> bool {
        self.page == 1
    }

    pub fn metadata(&self, total_items: u64) -> PageMetadata {
        PageMetadata::new(self.page, self.limit, total_items)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(super::DEFAULT_PAGE_SIZE)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Page Metadata
// ═══════════════════════════════════════════════════════════════════════════════

/// Metadata about a paginated result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    /// `ceil(total_items / limit)`; zero for an empty set.
    pub total_pages: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageMetadata {
    pub fn new(page: u32, limit: u32, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(u64::from(limit.max(1)));
        Self {
            page,
            limit,
            total_items,
            total_pages,
            has_previous: page > 1,
            has_next: u64::from(page) < total_pages,
        }
    }

    /// Whether the request points past the last record. Page 0 counts as
    /// the first page since the fields are public and deserializable.
    pub fn is_out_of_range(&self) -> bool {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit) >= self.total_items
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(1, 10).unwrap().offset(), 0);
        assert_eq!(PageRequest::new(3, 10).unwrap().offset(), 20);
        assert_eq!(
            PageRequest::new(u32::MAX, u32::MAX).unwrap().offset(),
            u64::from(u32::MAX - 1) * u64::from(u32::MAX)
        );
    }

    #[test]
    fn test_rejects_zero() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
    }

    #[test]
    fn test_total_pages_is_ceiling() {
        for (total, limit, pages) in [(0, 10, 0), (1, 10, 1), (10, 10, 1), (11, 10, 2), (95, 7, 14)] {
            assert_eq!(PageMetadata::new(1, limit, total).total_pages, pages);
        }
    }

    #[test]
    fn test_empty_set_flags() {
        let meta = PageMetadata::new(1, 10, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_previous);
        assert!(meta.is_out_of_range());
    }

    #[test]
    fn test_navigation_flags() {
        let meta = PageMetadata::new(2, 10, 25);
        assert!(meta.has_previous);
        assert!(meta.has_next);

        let last = PageMetadata::new(3, 10, 25);
        assert!(!last.has_next);
        assert!(!last.is_out_of_range());

        let beyond = PageMetadata::new(4, 10, 25);
        assert!(beyond.is_out_of_range());
        assert!(!beyond.has_next);
        assert!(beyond.has_previous);
    }

    #[test]
    fn test_page_zero_reads_as_first_page() {
        let meta = PageMetadata::new(0, 10, 25);
        assert!(!meta.is_out_of_range());
        assert!(!meta.has_previous);
        assert!(meta.has_next);

        let meta: PageMetadata = serde_json::from_str(
            r#"{"page":0,"limit":10,"total_items":0,"total_pages":0,"has_previous":false,"has_next":false}"#,
        )
        .unwrap();
        assert!(meta.is_out_of_range());
    }
}
