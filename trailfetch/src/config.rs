use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

const DOWNLOAD_DIR: &str = "trails";
const DOWNLOAD_WORKERS: NonZeroUsize = non_zero(100);
const DECOMPRESS_WORKERS: NonZeroUsize = non_zero(30);
const MAX_RETRIES: u8 = 2;
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("zero sized pool"),
    }
}

/// Fetch pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// The directory where files are downloaded and decompressed.
    pub download_dir: PathBuf,
    /// Number of download workers.
    pub download_workers: NonZeroUsize,
    /// Number of decompression workers.
    pub decompress_workers: NonZeroUsize,
    /// Number of retries after a failed transfer before discarding an item.
    pub max_retries: u8,
    /// Upper bound on a single transfer attempt, if any.
    pub attempt_timeout: Option<Duration>,
    /// Fixed delay before re-enqueueing a failed item, if any.
    pub retry_delay: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(DOWNLOAD_DIR),
            download_workers: DOWNLOAD_WORKERS,
            decompress_workers: DECOMPRESS_WORKERS,
            max_retries: MAX_RETRIES,
            attempt_timeout: Some(ATTEMPT_TIMEOUT),
            retry_delay: None,
        }
    }
}

impl FetchConfig {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_download_workers(self, download_workers: NonZeroUsize) -> Self {
        Self { download_workers, ..self }
    }

    #[inline]
    pub fn with_decompress_workers(self, decompress_workers: NonZeroUsize) -> Self {
        Self {
            decompress_workers,
            ..self
        }
    }

    #[inline]
    pub fn with_max_retries(self, max_retries: u8) -> Self {
        Self { max_retries, ..self }
    }

    #[inline]
    pub fn with_attempt_timeout(self, attempt_timeout: Option<Duration>) -> Self {
        Self { attempt_timeout, ..self }
    }

    #[inline]
    pub fn with_retry_delay(self, retry_delay: Option<Duration>) -> Self {
        Self { retry_delay, ..self }
    }

    #[inline]
    pub fn download_dir(&self) -> &Path {
        self.download_dir.as_path()
    }
}

/// A read-only AWS credential bundle, freely shared across workers once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>, session_token: Option<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    /// Read credentials from the standard `AWS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &'static str| lookup(name).filter(|value| !value.is_empty());

        Ok(Self {
            access_key_id: var("AWS_ACCESS_KEY_ID").ok_or(Error::MissingCredentials("AWS_ACCESS_KEY_ID"))?,
            secret_access_key: var("AWS_SECRET_ACCESS_KEY").ok_or(Error::MissingCredentials("AWS_SECRET_ACCESS_KEY"))?,
            session_token: var("AWS_SESSION_TOKEN"),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();

        assert_eq!(config.download_dir(), Path::new("trails"));
        assert_eq!(config.download_workers.get(), 100);
        assert_eq!(config.decompress_workers.get(), 30);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay, None);
    }

    #[test]
    fn test_builder() {
        let config = FetchConfig::new("logs")
            .with_download_workers(non_zero(2))
            .with_max_retries(0)
            .with_attempt_timeout(None);

        assert_eq!(config.download_dir(), Path::new("logs"));
        assert_eq!(config.download_workers.get(), 2);
        assert_eq!(config.decompress_workers, DECOMPRESS_WORKERS);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.attempt_timeout, None);
    }

    #[test]
    fn test_credentials_lookup() {
        let env = HashMap::from([
            ("AWS_ACCESS_KEY_ID", "AKIA0000"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", ""),
        ]);

        let creds = Credentials::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(creds, Credentials::new("AKIA0000", "secret", None));
        assert!(!format!("{creds:?}").contains("secret\""));
    }

    #[test]
    fn test_missing_credentials() {
        let err = Credentials::from_lookup(|name| (name == "AWS_ACCESS_KEY_ID").then(|| "AKIA0000".to_owned())).unwrap_err();

        assert!(matches!(err, Error::MissingCredentials("AWS_SECRET_ACCESS_KEY")));
        assert_eq!(err.exit_code(), crate::error::PRECONDITION_EXIT_CODE);
    }
}
