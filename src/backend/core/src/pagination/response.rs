//! The page result returned to clients and stored in listing cache entries.

use serde::{Deserialize, Serialize};

use super::offset::PageMetadata;

/// A bounded page of records plus navigation metadata.
///
/// Serialized as
/// `{data, totalData, totalPages, page, limit, hasNextPage, hasPrevPage}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub data: Vec<T>,
    pub total_data: u64,
    pub total_pages: u64,
    pub page: u32,
    pub limit: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl<T> PageResult<T> {
    pub fn from_metadata(data: Vec<T>, meta: &PageMetadata) -> Self {
        Self {
            data,
            total_data: meta.total_items,
            total_pages: meta.total_pages,
            page: meta.page,
            limit: meta.limit,
            has_next_page: meta.has_next,
            has_prev_page: meta.has_previous,
        }
    }

    /// Convert each item while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            data: self.data.into_iter().map(f).collect(),
            total_data: self.total_data,
            total_pages: self.total_pages,
            page: self.page,
            limit: self.limit,
            has_next_page: self.has_next_page,
            has_prev_page: self.has_prev_page,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
