//! Two-phase offset pagination over any countable source.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::offset::PageRequest;
use super::response::PageResult;
use crate::error::Result;

/// A filtered record set that can be counted and sliced.
///
/// `fetch` must return records in a deterministic order, with a stable
/// tie-breaker, so consecutive pages neither repeat nor skip records.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn count(&self) -> Result<u64>;

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<Self::Item>>;
}

/// Runs a [`PageSource`] for one [`PageRequest`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Paginator;

impl Paginator {
    /// Count first, then fetch the slice. A page past the end yields an empty
    /// `data` without touching the source a second time.
    #[instrument(skip(source), fields(page = request.page(), limit = request.limit()))]
    pub async fn paginate<S>(source: &S, request: PageRequest) -> Result<PageResult<S::Item>>
    where
        S: PageSource + ?Sized,
    {
        let total = source.count().await?;
        let meta = request.metadata(total);

        let data = if meta.is_out_of_range() {
            debug!(total, "Page beyond last record");
            Vec::new()
        } else {
            source
                .fetch(request.offset(), u64::from(request.limit()))
                .await?
        };

        Ok(PageResult::from_metadata(data, &meta))
    }
}
