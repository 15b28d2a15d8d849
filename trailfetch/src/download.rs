//! The download stage: transfer remote objects to the local storage with bounded retries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;

use crate::config::FetchConfig;
use crate::local;
use crate::progress::{Event, Progress};
use crate::queue::WorkQueue;
use crate::source::Transfer;
use crate::task::Stage;
use crate::{Error, Result};

/// A remote object to download.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadItem {
    /// Remote object key.
    pub key: String,
    /// Number of failed attempts so far.
    pub attempts: u8,
}

impl DownloadItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attempts: 0,
        }
    }

    /// Build the next attempt of this item.
    #[inline]
    fn retry(self) -> Self {
        Self {
            attempts: self.attempts.saturating_add(1),
            ..self
        }
    }
}

/// Download stage worker logic.
///
/// Each item is written to `download_dir/basename(key)`:
/// - items whose destination (or decompressed sibling) already holds a non-empty file are skipped,
///   so that an interrupted fetch can simply be run again;
/// - payloads are written to a staging file of their own, renamed on success, a destination file is
///   thus either missing or complete, even when the same key is being downloaded twice;
/// - failed items are re-enqueued up to `max_retries` times before being discarded.
#[derive(Debug)]
pub struct Downloader<S> {
    source: Arc<S>,
    download_dir: PathBuf,
    max_retries: u8,
    attempt_timeout: Option<Duration>,
    retry_delay: Option<Duration>,
    progress: Arc<Progress>,
}

impl<S: Transfer> Downloader<S> {
    pub fn new(source: Arc<S>, config: &FetchConfig, progress: Arc<Progress>) -> Self {
        Self {
            source,
            download_dir: config.download_dir.clone(),
            max_retries: config.max_retries,
            attempt_timeout: config.attempt_timeout,
            retry_delay: config.retry_delay,
            progress,
        }
    }

    /// Perform a single attempt, returning whether the object was actually transferred.
    async fn attempt(&self, key: &str) -> Result<bool> {
        let file_name = local::file_name(key).ok_or_else(|| Error::InvalidKey(key.to_owned()))?;
        let path = self.download_dir.join(file_name);

        if local::is_fetched(&path).await {
            return Ok(false);
        }
        if let Some(path) = local::decompressed_path(&path) {
            if local::is_fetched(&path).await {
                return Ok(false);
            }
        }

        let tmp = local::staging_path(&path);
        fs::create_dir_all(self.download_dir.join(local::STAGING_DIR)).await?;

        let res = match self.attempt_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.source.fetch(key, &tmp))
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(timeout))),
            None => self.source.fetch(key, &tmp).await,
        };

        if let Err(err) = res {
            // never leave a partial payload behind
            let _ = fs::remove_file(&tmp).await;
            return Err(err);
        }

        fs::rename(&tmp, &path).await?;

        Ok(true)
    }

    fn discard(&self, key: &str, err: &Error) {
        self.progress.record(Event::Discarded);
        tracing::warn!("Error downloading `{key}`: {err}; discarded.");
    }
}

impl<S: Transfer> Stage<DownloadItem> for Downloader<S> {
    async fn process(&self, item: DownloadItem, queue: &WorkQueue<DownloadItem>) {
        match self.attempt(&item.key).await {
            Ok(true) => {
                let count = self.progress.record(Event::Downloaded);
                tracing::trace!("Downloaded `{}` ({count})", item.key);
            }
            Ok(false) => {
                self.progress.record(Event::Skipped);
                tracing::trace!("Skipped `{}`, already in local storage", item.key);
            }
            Err(err @ Error::InvalidKey(_)) => self.discard(&item.key, &err),
            Err(err) if item.attempts < self.max_retries => {
                if let Some(delay) = self.retry_delay {
                    tokio::time::sleep(delay).await;
                }

                let key = item.key.clone();

                match queue.enqueue(item.retry()) {
                    Ok(()) => {
                        self.progress.record(Event::Requeued);
                        tracing::info!("Error downloading `{key}`: {err}; re-queued.");
                    }
                    Err(_) => self.discard(&key, &err),
                }
            }
            Err(err) => self.discard(&item.key, &err),
        }
    }
}
