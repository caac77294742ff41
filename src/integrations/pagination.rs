//! Lazy page streams for listing endpoints
//!
//! GitHub pages by page number, Jira Agile by `startAt` offset. Both are
//! expressed as a cursor that the fetch function turns into the next
//! cursor, or `None` once the service reports the last page.

use crate::{Result, SyncError};
use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;

/// One page of a listing plus the cursor of the page after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<u32>) -> Self {
        Self { items, next }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Stream every item of a paginated listing, starting at cursor `first`
///
/// Nothing is fetched until the stream is polled; pages are requested one
/// after another. Calling `paginate` again restarts from `first`.
pub fn paginate<'a, T, F, Fut>(first: u32, fetch: F) -> impl Stream<Item = Result<T>> + 'a
where
    T: 'a,
    F: FnMut(u32) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>>> + 'a,
{
    stream::try_unfold((Some(first), fetch), |(cursor, mut fetch)| async move {
        let Some(cursor) = cursor else {
            return Ok::<_, SyncError>(None);
        };
        let page = fetch(cursor).await?;
        let items = stream::iter(page.items.into_iter().map(Ok::<T, SyncError>));
        Ok(Some((items, (page.next, fetch))))
    })
    .try_flatten()
}

/// Next page number for page-numbered listings: a short page is the last one
pub fn next_page_number(current: u32, returned: usize, per_page: usize) -> Option<u32> {
    (returned >= per_page && returned > 0).then_some(current + 1)
}
