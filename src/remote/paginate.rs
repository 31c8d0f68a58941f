//! Offset pagination.
//!
//! Drains a collection by calling the page fetcher with `start` equal to the
//! number of records collected so far, until the total reported by the
//! first page is reached. Any page error fails the whole collection.

use crate::error::{Error, Result};
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

use super::source::{Page, RemoteSource, Resource};

/// Fetch every record of a collection.
///
/// `fetch_page` receives `(start, limit)`. The total is read from the first
/// page only. Endpoints without a total stop on their last-page flag. A page
/// with no items ends the loop early, since the collection shrank while it
/// was being read.
///
/// # Errors
///
/// Returns `InvalidArgument` for a zero `limit`, otherwise the first page error.
pub async fn fetch_all<F, Fut>(limit: u32, mut fetch_page: F) -> Result<Vec<Value>>
where
    F: FnMut(u64, u32) -> Fut,
    Fut: Future<Output = Result<Page>>,
{
    if limit == 0 {
        return Err(Error::InvalidArgument("page limit must be positive".to_string()));
    }

    let mut items: Vec<Value> = Vec::new();
    let mut total: Option<Option<u64>> = None;

    loop {
        let start = items.len() as u64;
        let page = fetch_page(start, limit).await?;
        let expected = *total.get_or_insert(page.total);
        let received = page.items.len();
        items.extend(page.items);

        let collected = items.len() as u64;
        debug!(start, received, collected, ?expected, "Fetched page");

        let done = match expected {
            Some(t) => collected >= t,
            None => page.is_last,
        };
        if done {
            break;
        }
        if received == 0 {
            warn!(collected, ?expected, "Empty page before reaching total, stopping");
            break;
        }
    }

    Ok(items)
}

/// Fetch every record of a remote resource.
///
/// # Errors
///
/// See [`fetch_all`].
pub async fn fetch_collection<R: RemoteSource>(
    remote: &R,
    resource: &Resource,
    limit: u32,
) -> Result<Vec<Value>> {
    let items = fetch_all(limit, |start, limit| remote.fetch_page(resource, start, limit)).await?;
    debug!(%resource, count = items.len(), "Collection fetched");
    Ok(items)
}
