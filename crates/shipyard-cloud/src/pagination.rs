//! Continuation-token pagination.

use std::future::Future;

use tracing::debug;

use crate::error::CloudResult;
use crate::types::Page;

/// Drain a paginated enumeration, calling `fetch` with the previous page's
/// continuation token until a page comes back without one.
///
/// An empty-string token is treated as the end of the listing.
pub async fn paginate<T, F, Fut>(mut fetch: F) -> CloudResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = CloudResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = fetch(token.take()).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }

    debug!(pages, items = items.len(), "pagination complete");
    Ok(items)
}
