use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A pipeline event accounted for in [`Progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Downloaded,
    Skipped,
    Requeued,
    Discarded,
    Decompressed,
    Corrupted,
    ListingFailed,
}

/// Shared pipeline counters, updated concurrently by the workers.
#[derive(Debug, Default)]
pub struct Progress {
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    requeued: AtomicUsize,
    discarded: AtomicUsize,
    decompressed: AtomicUsize,
    corrupted: AtomicUsize,
    failed_listings: AtomicUsize,
}

impl Progress {
    /// Account for `event`, returning the updated count for this kind of event.
    pub(crate) fn record(&self, event: Event) -> usize {
        let counter = match event {
            Event::Downloaded => &self.downloaded,
            Event::Skipped => &self.skipped,
            Event::Requeued => &self.requeued,
            Event::Discarded => &self.discarded,
            Event::Decompressed => &self.decompressed,
            Event::Corrupted => &self.corrupted,
            Event::ListingFailed => &self.failed_listings,
        };

        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Take a snapshot of the counters.
    pub fn report(&self) -> Report {
        Report {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            decompressed: self.decompressed.load(Ordering::Relaxed),
            corrupted: self.corrupted.load(Ordering::Relaxed),
            failed_listings: self.failed_listings.load(Ordering::Relaxed),
        }
    }
}

/// A snapshot of the [`Progress`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    /// Objects transferred to the local storage.
    pub downloaded: usize,
    /// Objects already found in the local storage.
    pub skipped: usize,
    /// Failed transfers pushed back for another attempt.
    pub requeued: usize,
    /// Objects given up on after their last failed attempt.
    pub discarded: usize,
    /// Archives successfully decompressed.
    pub decompressed: usize,
    /// Archives that could not be decompressed.
    pub corrupted: usize,
    /// Listing partitions skipped because of an error.
    pub failed_listings: usize,
}

impl Report {
    /// Whether some objects or partitions could not be fetched.
    pub fn is_incomplete(&self) -> bool {
        self.discarded > 0 || self.corrupted > 0 || self.failed_listings > 0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloaded, {} skipped, {} re-queued, {} discarded, {} decompressed, {} corrupted, {} failed listings",
            self.downloaded, self.skipped, self.requeued, self.discarded, self.decompressed, self.corrupted, self.failed_listings
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let progress = Progress::default();

        assert_eq!(progress.record(Event::Downloaded), 1);
        assert_eq!(progress.record(Event::Downloaded), 2);
        assert_eq!(progress.record(Event::Discarded), 1);

        let report = progress.report();
        assert_eq!(
            report,
            Report {
                downloaded: 2,
                discarded: 1,
                ..Default::default()
            }
        );
        assert!(report.is_incomplete());
        assert!(!Report::default().is_incomplete());
    }
}
