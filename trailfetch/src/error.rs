use std::time::Duration;

use thiserror::Error;

/// Exit status reported for any failed precondition (bad dates, missing credentials).
pub const PRECONDITION_EXIT_CODE: i32 = 42;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected HTTP status {status} for `{url}`")]
    Status { status: reqwest::StatusCode, url: url::Url },
    #[error(transparent)]
    Source(Box<dyn std::error::Error + Send + Sync>),
    #[error("no file name in object key `{0}`")]
    InvalidKey(String),

    #[error("dates must be formatted as YYYY/MM/DD, got `{input}`")]
    InvalidDate {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("the 'to' date ({to}) is earlier than the 'from' date ({from})")]
    InvertedRange { from: chrono::NaiveDate, to: chrono::NaiveDate },
    #[error("could not find AWS credentials: `{0}` is not set")]
    MissingCredentials(&'static str),
}

impl Error {
    /// Wrap any provider SDK error.
    pub fn provider(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Source(err.into())
    }

    /// Whether this error must abort a run before any worker is started.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::InvalidDate { .. } | Self::InvertedRange { .. } | Self::MissingCredentials(_))
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_precondition() {
            PRECONDITION_EXIT_CODE
        } else {
            1
        }
    }
}
