//! Resumable, checksum-verified download state machine.
//!
//! One call to [`Downloader::download`] drives a single destination through
//!
//! ```text
//! START → CHECK_SKIP → HEAD_PROBE → ETAG_RECONCILE → ENSURE_SIDECARS
//!       → DETERMINE_OFFSET → RANGE_FETCH → STREAM_APPEND → VERIFY_COMPLETE
//! ```
//!
//! ending in success, a restart from START, a bounded retry of the range
//! fetch, or a typed failure. All progress lives in the sidecar files, so a
//! killed process picks up where it stopped on the next call.
//!
//! # Example
//!
//! ```no_run
//! use epf_core::download::{DownloadConfig, DownloadRequest, Downloader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Downloader::new(DownloadConfig::default())?;
//! let request = DownloadRequest::new(
//!     "https://feeds.example.com/epf/v5/current/itunes20240101.tbz",
//!     "./exports/itunes20240101.tbz",
//! );
//! let report = downloader.download(&request).await?;
//! println!("{:?} after {} restarts", report.outcome, report.restarts);
//! # Ok(())
//! # }
//! ```

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, HeaderMap};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::checksum;
use super::client::{Credentials, HttpClient};
use super::constants::{
    CHECKSUM_SUFFIX, CHUNK_SIZE, CONNECT_TIMEOUT_SECS, DEFAULT_CHECKSUM_MARKER, DEFAULT_RETRIES,
    DEFAULT_RETRY_WAIT, MAX_INSET,
};
use super::error::{DownloadError, FailureType, classify_error};
use super::interrupt::Interrupt;
use super::progress::ProgressReporter;
use super::retry::{RetryBudget, RetryDecision};
use super::sidecar::{HeadersSidecar, SidecarPaths, file_len, remove_if_exists};

/// Tuning shared by every download of a [`Downloader`].
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Feed credentials sent with every request.
    pub credentials: Option<Credentials>,
    /// Range-fetch retry budget per `download` call.
    pub retries: u32,
    /// Fixed wait between range-fetch attempts.
    pub retry_wait: Duration,
    /// Text an existing checksum sidecar must contain.
    pub checksum_marker: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            retries: DEFAULT_RETRIES,
            retry_wait: DEFAULT_RETRY_WAIT,
            checksum_marker: DEFAULT_CHECKSUM_MARKER.to_string(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
        }
    }
}

/// A single URL to mirror into a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Remote export URL. The checksum lives at `<url>.md5`.
    pub url: String,
    /// Final local path. Sidecars are placed next to it.
    pub destination: PathBuf,
    /// Re-verify an existing final file instead of trusting it.
    pub verify_existing: bool,
}

impl DownloadRequest {
    /// Creates a request that trusts an existing destination.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            verify_existing: false,
        }
    }

    /// Sets whether an existing destination is re-verified.
    #[must_use]
    pub fn verify_existing(mut self, verify: bool) -> Self {
        self.verify_existing = verify;
        self
    }
}

/// How a successful download ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The destination existed and was trusted without contacting the server.
    AlreadyPresent,
    /// The destination existed and passed size and checksum verification.
    Verified,
    /// The payload was fetched (at least partly) and verified.
    Completed,
}

/// Summary of a successful [`Downloader::download`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Final file path.
    pub path: PathBuf,
    /// How the call ended.
    pub outcome: DownloadOutcome,
    /// Payload bytes appended to the partial file during this call.
    pub bytes_fetched: u64,
    /// Times the state machine went back to START.
    pub restarts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestartReason {
    RemoteChanged,
    ChecksumMismatch,
    Incomplete,
}

impl RestartReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::RemoteChanged => "remote file changed",
            Self::ChecksumMismatch => "checksum mismatch",
            Self::Incomplete => "partial file shorter than expected",
        }
    }
}

enum Step {
    Done(DownloadOutcome),
    Restart(RestartReason),
}

/// Per-call mutable state shared across restarts.
struct Transfer<'a> {
    request: &'a DownloadRequest,
    paths: SidecarPaths,
    interrupt: Interrupt,
    budget: RetryBudget,
    bytes_fetched: u64,
}

/// Probe facts needed by the rest of an attempt.
struct Probe {
    total: u64,
    sidecar: HeadersSidecar,
}

/// Resumable downloader for feed exports.
///
/// Downloads run one at a time; callers must not point two concurrent calls
/// at the same destination.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: HttpClient,
    config: DownloadConfig,
    cancel: CancellationToken,
}

impl Downloader {
    /// Builds a downloader with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: DownloadConfig) -> Result<Self, reqwest::Error> {
        let client =
            HttpClient::with_connect_timeout(config.credentials.clone(), config.connect_timeout)?;
        Ok(Self::with_client(client, config))
    }

    /// Builds a downloader around an existing client.
    #[must_use]
    pub fn with_client(client: HttpClient, config: DownloadConfig) -> Self {
        Self {
            client,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to interrupt downloads between filesystem operations.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the token that cancels this downloader's work.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Mirrors `request.url` into `request.destination`.
    ///
    /// Success means the destination exists and matched the published
    /// checksum, or that it already existed and `verify_existing` was off.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when the server cannot serve resumable
    /// ranges, [`DownloadError::InsetMismatch`] when stored and remote bytes
    /// disagree at the resume point, [`DownloadError::RetriesExhausted`] when
    /// range fetches keep failing, and [`DownloadError::Cancelled`] when the
    /// cancellation token fired. Sidecars are left in place in every case.
    #[instrument(skip(self, request), fields(url = %request.url, path = %request.destination.display()))]
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadReport, DownloadError> {
        let paths = SidecarPaths::for_destination(&request.destination);
        let mut transfer = Transfer {
            request,
            interrupt: Interrupt::new(self.cancel.clone(), &paths.destination),
            paths,
            budget: RetryBudget::new(self.config.retries, self.config.retry_wait),
            bytes_fetched: 0,
        };
        let mut restarts = 0_u32;

        loop {
            transfer.interrupt.checkpoint()?;
            match self.attempt(&mut transfer).await? {
                Step::Done(outcome) => {
                    info!(
                        ?outcome,
                        bytes_fetched = transfer.bytes_fetched,
                        restarts,
                        "download finished"
                    );
                    return Ok(DownloadReport {
                        path: transfer.paths.destination,
                        outcome,
                        bytes_fetched: transfer.bytes_fetched,
                        restarts,
                    });
                }
                Step::Restart(reason) => {
                    restarts += 1;
                    warn!(reason = reason.as_str(), restarts, "restarting download");
                }
            }
        }
    }

    async fn attempt(&self, transfer: &mut Transfer<'_>) -> Result<Step, DownloadError> {
        let request = transfer.request;
        let paths = transfer.paths.clone();
        let interrupt = transfer.interrupt.clone();

        if !request.verify_existing && file_len(&paths.destination).await?.is_some() {
            debug!("destination exists, trusting it");
            return Ok(Step::Done(DownloadOutcome::AlreadyPresent));
        }

        let probe = self.probe(&request.url, &interrupt).await?;

        if let Some(reason) = reconcile_etag(&paths, &probe.sidecar, &interrupt).await? {
            return Ok(Step::Restart(reason));
        }

        self.ensure_sidecars(&request.url, &paths, &probe.sidecar, &interrupt)
            .await?;

        if request.verify_existing
            && let Some(existing) = file_len(&paths.destination).await?
        {
            if existing == probe.total
                && checksum::verify_file(&paths.destination, &paths.checksum).await?
            {
                return Ok(Step::Done(DownloadOutcome::Verified));
            }
            warn!(existing, total = probe.total, "existing destination failed verification");
            interrupt.shielded(remove_if_exists(&paths.destination)).await?;
        }

        match file_len(&paths.partial).await? {
            Some(len) if len == probe.total => {
                debug!(len, "partial file already complete");
                return finalize(&paths, &interrupt).await;
            }
            Some(len) if len > probe.total => {
                warn!(len, total = probe.total, "partial file larger than remote, discarding");
                interrupt.shielded(remove_if_exists(&paths.partial)).await?;
            }
            Some(len) => info!(offset = len, total = probe.total, "resuming"),
            None => {
                if probe.total == 0 {
                    interrupt.shielded(create_empty(&paths.partial)).await?;
                    return finalize(&paths, &interrupt).await;
                }
                info!(total = probe.total, "starting fresh");
            }
        }

        self.fetch_with_retries(transfer, probe.total).await?;

        match file_len(&paths.partial).await?.unwrap_or(0) {
            len if len == probe.total => finalize(&paths, &interrupt).await,
            len => {
                debug!(len, total = probe.total, "body ended early");
                Ok(Step::Restart(RestartReason::Incomplete))
            }
        }
    }

    async fn probe(&self, url: &str, interrupt: &Interrupt) -> Result<Probe, DownloadError> {
        let response = interrupt.race(self.client.head(url)).await??;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        let headers = response.headers();

        let accept_ranges = header_str(headers, &ACCEPT_RANGES);
        if accept_ranges.map(str::trim) != Some("bytes") {
            return Err(DownloadError::MissingRangeSupport {
                url: url.to_string(),
                accept_ranges: accept_ranges.map(str::to_string),
            });
        }

        let total = header_str(headers, &CONTENT_LENGTH)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| DownloadError::MissingContentLength {
                url: url.to_string(),
            })?;

        debug!(total, etag = ?header_str(headers, &reqwest::header::ETAG), "probed remote");
        Ok(Probe {
            total,
            sidecar: HeadersSidecar::capture(url, headers),
        })
    }

    async fn ensure_sidecars(
        &self,
        url: &str,
        paths: &SidecarPaths,
        fresh: &HeadersSidecar,
        interrupt: &Interrupt,
    ) -> Result<(), DownloadError> {
        if file_len(&paths.headers).await?.is_none() {
            interrupt.shielded(fresh.store(&paths.headers)).await?;
        }

        if file_len(&paths.checksum).await?.is_some() {
            return checksum::ensure_marker(&paths.checksum, &self.config.checksum_marker).await;
        }

        let checksum_url = format!("{url}{CHECKSUM_SUFFIX}");
        let response = interrupt.race(self.client.get(&checksum_url)).await??;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::ChecksumUnavailable {
                url: checksum_url,
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        let body = interrupt
            .race(response.text())
            .await?
            .map_err(|e| DownloadError::network(&checksum_url, e))?;
        if body.trim().is_empty() {
            return Err(DownloadError::ChecksumUnavailable {
                url: checksum_url,
                reason: "empty body".to_string(),
            });
        }

        interrupt
            .shielded(async {
                tokio::fs::write(&paths.checksum, body.as_bytes())
                    .await
                    .map_err(|e| DownloadError::io(&paths.checksum, e))
            })
            .await?;
        debug!(path = %paths.checksum.display(), "saved checksum reference");
        Ok(())
    }

    /// Runs range fetches until the body ends, drawing failures from the budget.
    async fn fetch_with_retries(
        &self,
        transfer: &mut Transfer<'_>,
        total: u64,
    ) -> Result<(), DownloadError> {
        loop {
            let offset = file_len(&transfer.paths.partial).await?.unwrap_or(0);
            if offset >= total {
                return Ok(());
            }

            let error = match self.fetch_range(transfer, offset, total).await {
                Ok(()) => return Ok(()),
                Err(error) if classify_error(&error) == FailureType::Transient => error,
                Err(error) => return Err(error),
            };

            match transfer.budget.consume() {
                RetryDecision::Retry { delay, attempt } => {
                    warn!(
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        "range fetch failed, retrying"
                    );
                    transfer.interrupt.race(tokio::time::sleep(delay)).await?;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(%reason, error = %error, "giving up");
                    return Err(DownloadError::RetriesExhausted {
                        url: transfer.request.url.clone(),
                        attempts: transfer.budget.failures(),
                        last_error: error.to_string(),
                    });
                }
            }
        }
    }

    /// Fetches `[offset - inset, total)` and appends it past the overlap.
    async fn fetch_range(
        &self,
        transfer: &mut Transfer<'_>,
        offset: u64,
        total: u64,
    ) -> Result<(), DownloadError> {
        let url = transfer.request.url.as_str();
        let paths = &transfer.paths;
        let interrupt = &transfer.interrupt;

        let inset = offset.min(MAX_INSET);
        let first = offset - inset;
        let last = total - 1;
        let overlap = read_window(&paths.partial, first, inset).await?;

        let response = interrupt
            .race(self.client.get_range(url, first, last))
            .await??;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let expected = format!("bytes {first}-{last}/{total}");
        let actual = header_str(response.headers(), &CONTENT_RANGE);
        if actual != Some(expected.as_str()) {
            return Err(DownloadError::RangeMismatch {
                url: url.to_string(),
                expected,
                actual: actual.map(str::to_string),
            });
        }

        let mut file = interrupt.shielded(open_append(&paths.partial)).await?;
        let mut progress = ProgressReporter::new(total, offset);
        let mut written = offset;
        let mut unchecked: &[u8] = &overlap;
        let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_SIZE);
        let mut stream = response.bytes_stream();

        loop {
            let next = interrupt.race(stream.next()).await?;
            let bytes = match next {
                Some(Ok(bytes)) => bytes,
                Some(Err(error)) => return Err(DownloadError::network(url, error)),
                None => break,
            };
            pending.extend_from_slice(&bytes);
            while pending.len() >= CHUNK_SIZE {
                let rest = pending.split_off(CHUNK_SIZE);
                let mut chunk = std::mem::replace(&mut pending, rest);
                strip_overlap(&mut chunk, &mut unchecked, &paths.partial, first)?;
                written += append_chunk(&mut file, &chunk, &paths.partial, interrupt).await?;
                transfer.bytes_fetched += chunk.len() as u64;
                progress.advance(written);
            }
        }
        if !pending.is_empty() {
            strip_overlap(&mut pending, &mut unchecked, &paths.partial, first)?;
            written += append_chunk(&mut file, &pending, &paths.partial, interrupt).await?;
            transfer.bytes_fetched += pending.len() as u64;
        }
        progress.finish(written);
        Ok(())
    }
}

/// Drops every sidecar and the final file when the entity tag moved.
async fn reconcile_etag(
    paths: &SidecarPaths,
    fresh: &HeadersSidecar,
    interrupt: &Interrupt,
) -> Result<Option<RestartReason>, DownloadError> {
    if file_len(&paths.headers).await?.is_none() {
        return Ok(None);
    }
    let stored = HeadersSidecar::load(&paths.headers).await?;
    let stored_etag = stored.as_ref().and_then(HeadersSidecar::etag);
    if stored.is_some() && stored_etag == fresh.etag() {
        return Ok(None);
    }

    warn!(
        stored = stored_etag.unwrap_or("-"),
        fresh = fresh.etag().unwrap_or("-"),
        "entity tag changed, discarding local state"
    );
    for path in paths.invalidated_by_remote_change() {
        interrupt.shielded(remove_if_exists(path)).await?;
    }
    Ok(Some(RestartReason::RemoteChanged))
}

/// Renames the completed partial file and checks it against the reference.
async fn finalize(paths: &SidecarPaths, interrupt: &Interrupt) -> Result<Step, DownloadError> {
    interrupt
        .shielded(async {
            tokio::fs::rename(&paths.partial, &paths.destination)
                .await
                .map_err(|e| DownloadError::io(&paths.destination, e))
        })
        .await?;

    if checksum::verify_file(&paths.destination, &paths.checksum).await? {
        Ok(Step::Done(DownloadOutcome::Completed))
    } else {
        interrupt.shielded(remove_if_exists(&paths.destination)).await?;
        Ok(Step::Restart(RestartReason::ChecksumMismatch))
    }
}

/// Checks the leading bytes of `chunk` against the stored overlap and strips them.
fn strip_overlap(
    chunk: &mut Vec<u8>,
    unchecked: &mut &[u8],
    partial: &Path,
    window_start: u64,
) -> Result<(), DownloadError> {
    if unchecked.is_empty() {
        return Ok(());
    }
    let take = unchecked.len().min(chunk.len());
    if chunk[..take] != unchecked[..take] {
        return Err(DownloadError::InsetMismatch {
            path: partial.to_path_buf(),
            offset: window_start,
            stored: to_hex(unchecked),
            fetched: to_hex(&chunk[..take]),
        });
    }
    chunk.drain(..take);
    *unchecked = &unchecked[take..];
    Ok(())
}

async fn append_chunk(
    file: &mut File,
    chunk: &[u8],
    partial: &Path,
    interrupt: &Interrupt,
) -> Result<u64, DownloadError> {
    if chunk.is_empty() {
        return Ok(0);
    }
    interrupt
        .shielded(async {
            file.write_all(chunk)
                .await
                .map_err(|e| DownloadError::io(partial, e))?;
            file.flush().await.map_err(|e| DownloadError::io(partial, e))
        })
        .await?;
    Ok(chunk.len() as u64)
}

async fn open_append(path: &Path) -> Result<File, DownloadError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))
}

async fn create_empty(path: &Path) -> Result<(), DownloadError> {
    File::create(path)
        .await
        .map(drop)
        .map_err(|e| DownloadError::io(path, e))
}

/// Reads `len` bytes of `path` starting at `start`.
async fn read_window(path: &Path, start: u64, len: u64) -> Result<Vec<u8>, DownloadError> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let mut file = File::open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    file.seek(SeekFrom::Start(start))
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut window = Vec::new();
    file.take(len)
        .read_to_end(&mut window)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    Ok(window)
}

fn header_str<'h>(headers: &'h HeaderMap, name: &reqwest::header::HeaderName) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_overlap_removes_matching_prefix() {
        let stored = b"0123456789".to_vec();
        let mut unchecked: &[u8] = &stored;
        let mut chunk = b"0123456789abc".to_vec();
        strip_overlap(&mut chunk, &mut unchecked, Path::new("/tmp/a.part"), 90).unwrap();
        assert_eq!(chunk, b"abc");
        assert!(unchecked.is_empty());

        // Later chunks pass through untouched.
        let mut next = b"def".to_vec();
        strip_overlap(&mut next, &mut unchecked, Path::new("/tmp/a.part"), 90).unwrap();
        assert_eq!(next, b"def");
    }

    #[test]
    fn test_strip_overlap_detects_divergence() {
        let stored = b"0123456789".to_vec();
        let mut unchecked: &[u8] = &stored;
        let mut chunk = b"01234X6789abc".to_vec();
        let error =
            strip_overlap(&mut chunk, &mut unchecked, Path::new("/tmp/a.part"), 90).unwrap_err();
        match error {
            DownloadError::InsetMismatch {
                offset,
                stored,
                fetched,
                ..
            } => {
                assert_eq!(offset, 90);
                assert_eq!(stored, "30313233343536373839");
                assert_eq!(fetched, "30313233345836373839");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_strip_overlap_handles_short_first_chunk() {
        let stored = b"0123456789".to_vec();
        let mut unchecked: &[u8] = &stored;
        let mut chunk = b"0123".to_vec();
        strip_overlap(&mut chunk, &mut unchecked, Path::new("/tmp/a.part"), 0).unwrap();
        assert!(chunk.is_empty());
        assert_eq!(unchecked, b"456789");
    }

    #[tokio::test]
    async fn test_read_window_reads_tail() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("a.part");
        std::fs::write(&path, b"abcdefghijklmnop").unwrap();
        assert_eq!(read_window(&path, 6, 10).await.unwrap(), b"ghijklmnop");
        assert!(read_window(&path, 0, 0).await.unwrap().is_empty());
    }

    #[test]
    fn test_download_request_builder() {
        let request = DownloadRequest::new("https://example.com/a.tbz", "/tmp/a.tbz")
            .verify_existing(true);
        assert!(request.verify_existing);
        assert_eq!(request.destination, PathBuf::from("/tmp/a.tbz"));
    }

    #[test]
    fn test_download_config_defaults() {
        let config = DownloadConfig::default();
        assert_eq!(config.retries, 5);
        assert_eq!(config.retry_wait, Duration::from_secs(3));
        assert_eq!(config.checksum_marker, "tbz");
        assert!(config.credentials.is_none());
    }
}
