//! A bounded-concurrency bulk fetcher for CloudTrail log archives.
//!
//! The crate provides features dedicated to:
//! - walking through truncated listing responses of an object store,
//! - draining a shared work queue with fixed-size pools of asynchronous workers,
//! - downloading objects with bounded retries and per-attempt timeouts,
//! - decompressing downloaded archives in place.
//!
//! A fetch is made of two stages run one after the other, each one through its own [`task::Pool`] pulling items from a
//! [`queue::WorkQueue`]: the download stage is fed with the object keys listed for each day partition of a trail, then,
//! once the whole download batch has been joined, the decompression stage is fed with the files of the download directory.
//! Failed transfers are pushed back into the queue with their attempt count until they get discarded, while failed
//! listings and decompressions are just logged: a fetch is never aborted by a single object, it may only end up incomplete
//! as told by its [`Report`].
//!
//! Here is the local storage layout of a fetch:
//!
//! ```text
//!     - download directory
//!       L {basename(key)}            (fetched, still compressed)
//!       L {basename(key) - ".gz"}    (fetched and decompressed)
//!       L .partial
//!         L {basename(key)}.{seq}    (being transferred or decompressed)
//! ```
//!
//! A non-empty file at either of the first two paths means the object has already been fetched: running a fetch again
//! over the same directory simply resumes it. Staging files left over by an interrupted run are removed on start.

pub mod config;
pub mod decompress;
pub mod download;
mod error;
pub mod fetch;
pub mod local;
pub mod paginate;
mod progress;
pub mod queue;
pub mod source;
pub mod task;
pub mod trail;

#[cfg(test)]
mod testing;

pub use config::{Credentials, FetchConfig};
pub use error::{Error, Result, PRECONDITION_EXIT_CODE};
pub use fetch::Fetcher;
pub use progress::{Progress, Report};
pub use trail::{DateRange, TrailLocation};
