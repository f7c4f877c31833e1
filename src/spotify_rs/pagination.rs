use std::collections::HashSet;
use std::future::Future;

use color_eyre::{Result, eyre::eyre};
use futures::{Stream, StreamExt, pin_mut};

use crate::ports::catalog::ApiResponse;
use crate::spotify_rs::types::Page;

/// Lazily walks a cursor-paged listing starting at `first_url`.
///
/// Each item is one page worth of entries. The stream ends after the page
/// whose `next` is null, or right after the first failed page. A cursor that
/// points back at a visited page yields an error, the listing is incomplete. It is cheap to
/// build, so restarting a listing just means calling this again.
pub fn pages<T, F, Fut>(
    first_url: String,
    fetch: F,
) -> impl Stream<Item = Result<ApiResponse<Vec<T>>>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<ApiResponse<Page<T>>>>,
{
    async_stream::stream! {
        let mut visited = HashSet::new();
        let mut next_url = Some(first_url);

        while let Some(url) = next_url.take() {
            if !visited.insert(url.clone()) {
                yield Err(eyre!("Pagination cursor repeated at {url}"));
                break;
            }

            match fetch(url).await {
                Ok(ApiResponse::Success { status, data: page }) => {
                    next_url = page.next;
                    yield Ok(ApiResponse::Success {
                        status,
                        data: page.items.unwrap_or_default(),
                    });
                }
                Ok(ApiResponse::Failure { status }) => {
                    yield Ok(ApiResponse::Failure { status });
                    break;
                }
                Err(error) => {
                    yield Err(error);
                    break;
                }
            }
        }
    }
}

/// Drains a page stream into one collection.
///
/// A failed page fails the whole listing, whatever was gathered before it is
/// dropped.
pub async fn collect_pages<T>(
    pages: impl Stream<Item = Result<ApiResponse<Vec<T>>>>,
) -> Result<ApiResponse<Vec<T>>> {
    pin_mut!(pages);

    let mut items = Vec::new();
    let mut status = 200;
    while let Some(page) = pages.next().await {
        match page? {
            ApiResponse::Success { status: page_status, data } => {
                status = page_status;
                items.extend(data);
            }
            ApiResponse::Failure { status } => {
                tracing::debug!(
                    "Discarding {} items gathered before failed page",
                    items.len()
                );
                return Ok(ApiResponse::Failure { status });
            }
        }
    }

    Ok(ApiResponse::Success {
        status,
        data: items,
    })
}
