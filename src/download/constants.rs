//! Constants for the download module (chunking, retry budget, progress cadence).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
///
/// No read timeout is applied: a stalled transfer blocks until cancelled.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Size of each append to the partial file (1 MiB).
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Maximum overlap re-verified at a resume boundary.
pub const MAX_INSET: u64 = 10;

/// Default number of failed range fetches tolerated per download.
pub const DEFAULT_RETRIES: u32 = 5;

/// Default fixed wait between failed range fetches.
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(3);

/// Minimum interval between progress lines.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(3);

/// Number of throughput samples kept for the rate average.
pub const RATE_HISTORY_LEN: usize = 10;

/// Marker every checksum sidecar of the EPF feed is expected to contain.
pub const DEFAULT_CHECKSUM_MARKER: &str = "tbz";

/// Sidecar suffixes appended to the destination path.
pub const HEADERS_SUFFIX: &str = ".headers";
pub const PARTIAL_SUFFIX: &str = ".part";
pub const CHECKSUM_SUFFIX: &str = ".md5";
