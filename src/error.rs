//! Error types for the synchronization engine.

use thiserror::Error;

/// Errors that can occur while driving a sync run.
///
/// Task-level failures (a single link-or-copy attempt) never surface as
/// this type — they are reduced to [`crate::models::TaskOutcome::Failed`]
/// and collected into the run's `SyncSummary` instead. This
/// type is for what's fatal to the whole run: configuration and the
/// upfront instance-listing barrier.
#[derive(Error, Debug)]
pub enum SyncError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote server returned a non-2xx status this client did not
    /// recognize as a fallback signal (not 404, or not 404/405 where both
    /// are accepted).
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body from the API, if any
        message: String,
    },

    /// A `base_url` or derived endpoint URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The sync configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reconciliation found a checksum with no server holding it.
    #[error("no source available for checksum {0}")]
    NoSource(String),

    /// An upload call returned 2xx but its body carried neither `id` nor
    /// `assetId`.
    #[error("upload succeeded but response carried no asset id")]
    UploadNoId,

    /// `api_key` was empty or contained characters invalid in an HTTP
    /// header value.
    #[error("invalid API key")]
    InvalidApiKey,

    /// Reading or writing a local file (e.g. the config file) failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result`s using [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;
