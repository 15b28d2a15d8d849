//! Remote object sources: listing and transfer capabilities of a cloud storage client.

use std::future::Future;
use std::path::Path;

use crate::paginate::Page;
use crate::Result;

mod http;
pub use http::HttpSource;

#[cfg(feature = "s3")]
mod s3;
#[cfg(feature = "s3")]
pub use s3::S3Source;

/// A paginated object listing.
pub trait ListObjects: Send + Sync + 'static {
    /// List a page of object keys starting with `prefix`, continuing from `token` if any.
    fn list_page(&self, prefix: &str, token: Option<String>) -> impl Future<Output = Result<Page<String>>> + Send;
}

/// An object transfer to the local storage.
pub trait Transfer: Send + Sync + 'static {
    /// Write the whole content of the object `key` to `path`, creating or truncating it.
    fn fetch(&self, key: &str, path: &Path) -> impl Future<Output = Result<()>> + Send;
}
