//! The decompression stage: gunzip downloaded archives in place.

use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;

use crate::local;
use crate::progress::{Event, Progress};
use crate::queue::WorkQueue;
use crate::task::Stage;

/// Decompression stage worker logic.
///
/// Files bearing the compressed extension are decompressed to their sibling path without it, then
/// deleted. Other files are left untouched. Failures are logged and never retried.
#[derive(Debug)]
pub struct Decompressor {
    progress: Arc<Progress>,
}

impl Decompressor {
    pub fn new(progress: Arc<Progress>) -> Self {
        Self { progress }
    }
}

impl Stage<PathBuf> for Decompressor {
    async fn process(&self, src: PathBuf, _: &WorkQueue<PathBuf>) {
        let Some(dst) = local::decompressed_path(&src) else {
            return;
        };

        let res = {
            let (src, dst) = (src.clone(), dst.clone());
            tokio::task::spawn_blocking(move || gunzip(&src, &dst)).await
        };

        match res {
            Ok(Ok(())) => {
                let count = self.progress.record(Event::Decompressed);
                tracing::trace!("Decompressed `{}` ({count})", dst.display());
            }
            Ok(Err(err)) => {
                self.progress.record(Event::Corrupted);
                tracing::error!("Error decompressing `{}`: {err}", src.display());
            }
            Err(err) => {
                self.progress.record(Event::Corrupted);
                tracing::error!("Error decompressing `{}`: {err}", src.display());
            }
        }
    }
}

/// Decompress the single-member gzip archive `src` to `dst`, then delete `src`.
///
/// `dst` is written through a staging file so that it is never left partially written.
pub fn gunzip(src: &Path, dst: &Path) -> io::Result<()> {
    let tmp = local::staging_path(dst);

    let res = (|| -> io::Result<()> {
        if let Some(staging) = tmp.parent() {
            fs::create_dir_all(staging)?;
        }

        let mut decoder = GzDecoder::new(BufReader::new(fs::File::open(src)?));
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);

        io::copy(&mut decoder, &mut writer)?;

        writer.flush()?;
        writer.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()?;

        fs::rename(&tmp, dst)
    })();

    if res.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    res?;

    fs::remove_file(src)
}
