//! Error types for the crawler.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that end a crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The listing request failed at the transport level.
    #[error("failed to fetch listing {url}: {source}")]
    Fetch {
        /// Listing URL.
        url: String,
        /// The underlying request error.
        #[source]
        source: DownloadError,
    },

    /// The listing answered with a non-success status.
    #[error("HTTP {status} fetching listing {url}")]
    HttpStatus {
        /// Listing URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The page is not a name-sortable directory index.
    #[error("{url} is not a directory listing")]
    NotAListing {
        /// Listing URL.
        url: String,
    },

    /// The caller cancelled the crawl.
    #[error("crawl cancelled before fetching {url}")]
    Cancelled {
        /// Listing that was about to be fetched.
        url: String,
    },
}
