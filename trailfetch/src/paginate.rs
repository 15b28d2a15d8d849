//! Transparent pagination over truncated listing responses.

use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};

/// A single page of a listing response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token to pass to the next call, `None` (or empty) on the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }

    /// Build the last page of a listing.
    #[inline]
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Lazily walk through all pages of a listing.
///
/// `call` is invoked with the last continuation token (`None` on the first call) and must carry
/// any other listing parameter (bucket, prefix, ...) itself. The walk stops after the first page
/// returning no continuation token, or an empty one. Any error is yielded once and ends the walk.
pub fn pages<T, E, F, Fut>(call: F) -> impl Stream<Item = Result<Vec<T>, E>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    stream::try_unfold((call, Some(None)), |(mut call, state)| async move {
        let Some(token) = state else {
            return Ok(None);
        };

        let Page { items, next_token } = call(token).await?;
        let next = next_token.filter(|token| !token.is_empty());

        Ok(Some((items, (call, next.map(Some)))))
    })
}

/// Collect all items of a listing, in page order.
///
/// # Example
/// ```
/// # tokio_test::block_on(async {
/// # use trailfetch::paginate::{paginate, Page};
/// let items = paginate(|token: Option<String>| async move {
///     Ok::<_, std::convert::Infallible>(match token.as_deref() {
///         None => Page::new(vec![1, 2], Some("2".into())),
///         Some(_) => Page::last(vec![3]),
///     })
/// })
/// .await
/// .unwrap();
///
/// assert_eq!(items, [1, 2, 3]);
/// # })
/// ```
pub async fn paginate<T, E, F, Fut>(call: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    pages(call).try_concat().await
}
