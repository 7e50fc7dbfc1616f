use crate::error::UpstreamError;
use crate::github::Page;
use std::future::Future;
use tracing::debug;

/// Drain a cursor-paginated listing, starting at page 1
///
/// `fetch` is called with each page number in turn until the host reports no
/// next page (absent or zero). The first error aborts the walk and partial
/// results are dropped. A cursor that does not move forward is an error.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, UpstreamError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, UpstreamError>>,
{
    let mut items = Vec::new();
    let mut current = 1;

    loop {
        let page = fetch(current).await?;
        debug!(page = current, items = page.items.len(), next = ?page.next_page, "Fetched page");
        items.extend(page.items);

        match page.next_page {
            None | Some(0) => break,
            Some(next) if next <= current => {
                return Err(UpstreamError::StalledCursor { current, next });
            }
            Some(next) => current = next,
        }
    }

    Ok(items)
}
