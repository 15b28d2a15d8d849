//! Local download directory layout.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::{fs, io};

/// Directory of the files still being written, within the download directory.
pub const STAGING_DIR: &str = ".partial";
/// Extension of the (single-member gzip) compressed files.
pub const COMPRESSED_EXT: &str = "gz";

/// Return the local file name of a remote key, ie. its last path segment.
pub fn file_name(key: &str) -> Option<&str> {
    match key.rsplit('/').next() {
        Some("" | "." | ".." | STAGING_DIR) | None => None,
        name => name,
    }
}

/// Return a fresh in-flight path for `path`, in the staging directory next to it.
///
/// Every call yields a distinct path, so that concurrent writers of the same destination never
/// share their partial payload.
pub fn staging_path(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);

    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{}", SEQ.fetch_add(1, Ordering::Relaxed)));

    path.with_file_name(STAGING_DIR).join(name)
}

/// Return the decompressed sibling of `path` if it bears the compressed extension.
pub fn decompressed_path(path: &Path) -> Option<PathBuf> {
    path.extension().is_some_and(|ext| ext == COMPRESSED_EXT).then(|| path.with_extension(""))
}

/// Whether `path` already holds a fetched file, ie. exists and is not empty.
pub async fn is_fetched(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

/// List regular files directly stored in `dir`.
pub async fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = vec![];
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }

    files.sort_unstable();

    Ok(files)
}

/// Delete incomplete files left over by an interrupted run, returning how many were removed.
pub async fn clean_partials(dir: &Path) -> io::Result<usize> {
    let staging = dir.join(STAGING_DIR);

    if !fs::try_exists(&staging).await? {
        return Ok(0);
    }

    let mut count = 0;

    for path in list_files(&staging).await? {
        tracing::trace!("Clean incomplete file from local storage: `{}`", path.display());

        fs::remove_file(&path).await?;
        count += 1;
    }

    Ok(count)
}
