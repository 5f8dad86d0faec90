use std::num::NonZeroU32;
use std::time::Duration;

use crate::feed::fetcher::{FetchError, PageSource};
use crate::feed::types::ArticleRecord;

/// Walks the upstream listing page by page and concatenates the records.
///
/// Page 1 is always fetched and kept, even when empty. From page 2 on, the
/// walk stops at the first empty page or once `max_pages` pages have been
/// fetched. After every non-empty page from page 2 onwards, the loop waits
/// `page_delay` before requesting the next one. There is no wait between
/// pages 1 and 2, and none after the page that hits the cap.
///
/// Records keep fetch order (page order, then position within the page) and
/// are not deduplicated.
///
/// # Errors
///
/// The first [`FetchError`] from any page aborts the walk; records gathered
/// so far are discarded.
///
/// # Termination
///
/// With `max_pages = None` the walk only ends on an empty page. An upstream
/// that keeps serving records holds the caller here indefinitely.
pub async fn aggregate<S: PageSource>(
    source: &S,
    page_delay: Duration,
    max_pages: Option<NonZeroU32>,
) -> Result<Vec<ArticleRecord>, FetchError> {
    let cap = max_pages.map(NonZeroU32::get);
    if cap.is_none() {
        tracing::warn!("Aggregating without a page cap; run ends only on an empty page");
    }

    let mut records = source.fetch(1).await?;
    let mut pages_fetched: u32 = 1;
    let mut page: u32 = 2;

    while cap.is_none_or(|c| pages_fetched < c) {
        let batch = source.fetch(page).await?;
        if batch.is_empty() {
            tracing::debug!(page = page, "Empty page, upstream exhausted");
            break;
        }

        records.extend(batch);
        pages_fetched += 1;

        if cap.is_some_and(|c| pages_fetched >= c) {
            tracing::debug!(pages = pages_fetched, "Page cap reached");
            break;
        }

        if !page_delay.is_zero() {
            tracing::debug!(page = page, delay_secs = page_delay.as_secs_f64(), "Waiting before next page");
            tokio::time::sleep(page_delay).await;
        }
        page += 1;
    }

    tracing::info!(
        pages = pages_fetched,
        records = records.len(),
        "Aggregated upstream articles"
    );
    Ok(records)
}
