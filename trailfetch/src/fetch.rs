//! The fetch pipeline: list day partitions, download them, then decompress the local storage.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::fs;

use crate::config::FetchConfig;
use crate::decompress::Decompressor;
use crate::download::{DownloadItem, Downloader};
use crate::paginate::paginate;
use crate::progress::{Event, Progress, Report};
use crate::source::{ListObjects, Transfer};
use crate::task::run_batch;
use crate::trail::{DateRange, TrailLocation};
use crate::Result;

/// CloudTrail logs fetcher.
///
/// Both stages are run through their own fixed-size worker pool, the decompression stage only
/// starting once the whole download batch has been joined.
#[derive(Debug)]
pub struct Fetcher<S> {
    source: Arc<S>,
    config: FetchConfig,
    progress: Arc<Progress>,
}

impl<S: ListObjects + Transfer> Fetcher<S> {
    pub fn new(source: S, config: FetchConfig) -> Self {
        Self::with_shared_source(Arc::new(source), config)
    }

    pub fn with_shared_source(source: Arc<S>, config: FetchConfig) -> Self {
        Self {
            source,
            config,
            progress: Arc::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Snapshot of the pipeline counters so far.
    #[inline]
    pub fn report(&self) -> Report {
        self.progress.report()
    }

    /// Fetch and decompress the logs of every location over `range`.
    pub async fn run(&self, locations: &[TrailLocation], range: &DateRange) -> Result<Report> {
        for location in locations {
            self.fetch_region(location, range).await?;
        }

        self.decompress().await?;

        Ok(self.report())
    }

    /// Download the logs of `location` over `range`.
    ///
    /// A partition that can't be listed is logged and skipped.
    pub async fn fetch_region(&self, location: &TrailLocation, range: &DateRange) -> Result<()> {
        tracing::info!("Downloading log files in {}...", location.region);

        let keys = self.list_keys(location.partitions(range)).await;
        self.download(keys).await?;

        tracing::info!("Done with {}: {}", location.region, self.report());

        Ok(())
    }

    /// List all object keys under `prefixes`, skipping those which can't be listed.
    ///
    /// Keys are returned once each, in listing order.
    pub async fn list_keys(&self, prefixes: impl IntoIterator<Item = String>) -> Vec<String> {
        let mut keys = vec![];
        let mut seen = HashSet::new();

        for prefix in prefixes {
            match paginate(|token| self.source.list_page(&prefix, token)).await {
                Ok(page_keys) => keys.extend(page_keys.into_iter().filter(|key| seen.insert(key.clone()))),
                Err(err) => {
                    self.progress.record(Event::ListingFailed);
                    tracing::error!("Error listing `{prefix}`: {err}; skipped.");
                }
            }
        }

        keys
    }

    /// Run the download stage over `keys`, resuming from the files already in the download directory.
    pub async fn download(&self, keys: impl IntoIterator<Item = String>) -> Result<()> {
        let dir = self.config.download_dir();

        fs::create_dir_all(dir).await?;

        let cleaned = crate::local::clean_partials(dir).await?;
        if cleaned > 0 {
            tracing::debug!("Cleaned {cleaned} incomplete files from `{}`", dir.display());
        }

        let stage = Downloader::new(Arc::clone(&self.source), &self.config, Arc::clone(&self.progress));

        run_batch(self.config.download_workers, Arc::new(stage), keys.into_iter().map(DownloadItem::new)).await;

        Ok(())
    }

    /// Run the decompression stage over every file of the download directory.
    pub async fn decompress(&self) -> Result<()> {
        tracing::info!("Decompressing files...");

        let dir = self.config.download_dir();

        if !fs::try_exists(dir).await? {
            return Ok(());
        }

        let files = crate::local::list_files(dir).await?;
        let stage = Decompressor::new(Arc::clone(&self.progress));

        run_batch(self.config.decompress_workers, Arc::new(stage), files).await;

        tracing::info!("Decompressed files in `{}`", dir.display());

        Ok(())
    }
}
