//! Offset pagination.
//!
//! This module provides:
//! - Query parameter parsing with configured defaults and bounds
//! - `PageRequest` and its offset arithmetic
//! - A two-phase (count, then fetch) `Paginator` over any `PageSource`
//! - The `PageResult<T>` response shape
//!
//! # Usage
//!
//! ```rust,ignore
//! use teachtrack_core::pagination::{PageQuery, Paginator};
//!
//! let request = query.into_request(&config.pagination)?;
//! let page = Paginator::paginate(&source, request).await?;
//! ```

mod offset;
mod paginator;
mod query;
mod response;

pub use offset::{PageMetadata, PageRequest};
pub use paginator::{PageSource, Paginator};
pub use query::PageQuery;
pub use response::PageResult;

/// Default page size if not specified.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Minimum page number (1-indexed).
pub const MIN_PAGE_NUMBER: u32 = 1;
