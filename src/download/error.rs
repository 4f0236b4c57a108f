//! Error types for the download module.
//!
//! Every divergence between expected and observed state either restarts the
//! state machine internally or surfaces here. Use [`classify_error`] to tell
//! protocol violations from transient conditions and data divergence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can end a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response on a request that is not retried.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while touching the destination or a sidecar.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The server does not advertise byte-range support.
    #[error("{url} does not support byte ranges (Accept-Ranges: {accept_ranges:?})")]
    MissingRangeSupport {
        /// The probed URL.
        url: String,
        /// The advertised `Accept-Ranges` value, if any.
        accept_ranges: Option<String>,
    },

    /// The metadata probe did not carry a usable `Content-Length`.
    #[error("{url} did not report a content length")]
    MissingContentLength {
        /// The probed URL.
        url: String,
    },

    /// The server answered a ranged request with a different range.
    #[error("range mismatch for {url}: requested {expected:?}, got {actual:?}")]
    RangeMismatch {
        /// The fetched URL.
        url: String,
        /// The `Content-Range` value the request implies.
        expected: String,
        /// The `Content-Range` value the server sent, if any.
        actual: Option<String>,
    },

    /// Bytes at the resume boundary differ from what is already stored.
    #[error(
        "remote content diverged at offset {offset} of {path}: stored {stored}, fetched {fetched}"
    )]
    InsetMismatch {
        /// Partial file being resumed.
        path: PathBuf,
        /// Offset of the first overlapping byte.
        offset: u64,
        /// Hex of the stored overlap window.
        stored: String,
        /// Hex of the freshly fetched overlap window.
        fetched: String,
    },

    /// The checksum reference could not be fetched.
    #[error("checksum reference unavailable from {url}: {reason}")]
    ChecksumUnavailable {
        /// The checksum URL.
        url: String,
        /// Why it is unusable.
        reason: String,
    },

    /// An existing checksum sidecar does not look like one of this feed.
    #[error("checksum sidecar {path} does not mention {marker:?}")]
    InvalidChecksumSidecar {
        /// The sidecar path.
        path: PathBuf,
        /// The marker that was expected.
        marker: String,
    },

    /// The headers sidecar could not be serialized.
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        /// The sidecar path.
        path: PathBuf,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// The range-fetch retry budget ran out.
    #[error("gave up on {url} after {attempts} failed range fetches (last: {last_error})")]
    RetriesExhausted {
        /// The URL being fetched.
        url: String,
        /// Number of failed attempts.
        attempts: u32,
        /// Display form of the last failure.
        last_error: String,
    },

    /// The caller cancelled the download between two filesystem operations.
    #[error("download of {path} cancelled")]
    Cancelled {
        /// The destination path.
        path: PathBuf,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(path: impl Into<PathBuf>) -> Self {
        Self::Cancelled { path: path.into() }
    }
}

/// How a failure relates to the remote resource and to retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// The server or local environment violated a precondition. Not retryable.
    Protocol,
    /// A request failed in a way that may succeed on retry. Bounded by the budget.
    Transient,
    /// Stored and remote data disagree. Recovery means discarding local state.
    Divergence,
    /// The caller asked to stop.
    Cancelled,
}

/// Classifies a download error for retry decisions.
///
/// The range fetch spends its retry budget on exactly the `Transient`
/// errors. A failed probe or checksum request is fatal whatever its class.
///
/// | Error | Type |
/// |-------|------|
/// | `Network`, `HttpStatus` | Transient |
/// | `InsetMismatch` | Divergence |
/// | `Cancelled` | Cancelled |
/// | everything else | Protocol |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::Network { .. } | DownloadError::HttpStatus { .. } => {
            FailureType::Transient
        }
        DownloadError::InsetMismatch { .. } => FailureType::Divergence,
        DownloadError::Cancelled { .. } => FailureType::Cancelled,
        DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::MissingRangeSupport { .. }
        | DownloadError::MissingContentLength { .. }
        | DownloadError::RangeMismatch { .. }
        | DownloadError::ChecksumUnavailable { .. }
        | DownloadError::InvalidChecksumSidecar { .. }
        | DownloadError::Serialize { .. }
        | DownloadError::RetriesExhausted { .. } => FailureType::Protocol,
    }
}
