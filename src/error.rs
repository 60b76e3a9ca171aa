//! Error taxonomy for the extraction pipeline.
//!
//! Only [`ConfigError`] can end a run, and it is raised before any source is
//! touched. Everything else is recovered below the top level:
//!
//! | Error | Scope | Recovery |
//! |-------|-------|----------|
//! | [`FetchError`] | one source | source skipped, failure reported |
//! | [`SourceError`] | one source | source skipped, failure reported |
//! | [`FieldError`] | one fragment | fragment dropped |
//!
//! "No probe matched" is deliberately not an error type: it is reported to the
//! observer and recorded as `SourceOutcome::NoMatch`.

use std::time::Duration;

use reqwest::StatusCode;

/// A source could not be fetched.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned unexpected status {status}")]
    Status { url: String, status: StatusCode },
    #[error("{url} did not respond within {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("cannot read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether a retry wrapper may try again. Client errors (4xx) are final.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => status.is_server_error(),
            FetchError::Io { .. } => false,
        }
    }
}

/// A whole source's pipeline failed.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
}

/// A single fragment failed validation and is dropped.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unparsable time {0:?}")]
    BadTime(String),
    #[error("title is empty after cleaning")]
    EmptyTitle,
    #[error("title is {0} characters long")]
    TitleTooLong(usize),
    #[error("channel {0:?} is not on the allow-list")]
    UnknownChannel(String),
    #[error("date {0:?} is not the target date")]
    OtherDate(String),
}

/// Configuration could not be loaded.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
