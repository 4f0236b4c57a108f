//! Sidecar artifacts persisted next to a download.
//!
//! Three files carry the transfer state across process restarts:
//!
//! - `<path>.headers`: JSON snapshot of the metadata probe plus the source URL
//! - `<path>.part`: payload received so far
//! - `<path>.md5`: the checksum reference published next to the export

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::DownloadError;
use super::constants::{CHECKSUM_SUFFIX, HEADERS_SUFFIX, PARTIAL_SUFFIX};

/// Paths of the final artifact and its sidecars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarPaths {
    /// Final, verified artifact.
    pub destination: PathBuf,
    /// Captured response metadata.
    pub headers: PathBuf,
    /// In-progress payload.
    pub partial: PathBuf,
    /// Checksum reference.
    pub checksum: PathBuf,
}

impl SidecarPaths {
    /// Derives the sidecar triad from a destination path.
    #[must_use]
    pub fn for_destination(destination: &Path) -> Self {
        Self {
            destination: destination.to_path_buf(),
            headers: with_suffix(destination, HEADERS_SUFFIX),
            partial: with_suffix(destination, PARTIAL_SUFFIX),
            checksum: with_suffix(destination, CHECKSUM_SUFFIX),
        }
    }

    /// Paths removed when the remote resource changed underneath us.
    pub(crate) fn invalidated_by_remote_change(&self) -> [&Path; 4] {
        [
            self.headers.as_path(),
            self.partial.as_path(),
            self.checksum.as_path(),
            self.destination.as_path(),
        ]
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Snapshot of the metadata probe written to `<path>.headers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadersSidecar {
    /// Source URL of the download.
    pub url: String,
    /// Response headers, lowercase names.
    pub headers: BTreeMap<String, String>,
}

impl HeadersSidecar {
    /// Captures the textual headers of a probe response.
    #[must_use]
    pub fn capture(url: &str, headers: &HeaderMap) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        Self {
            url: url.to_string(),
            headers,
        }
    }

    /// Returns the recorded entity tag.
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.headers.get("etag").map(String::as_str)
    }

    /// Reads the sidecar, returning `Ok(None)` when it is absent or unreadable.
    ///
    /// An unreadable sidecar cannot vouch for the partial payload, so callers
    /// treat it like an entity-tag mismatch.
    pub async fn load(path: &Path) -> Result<Option<Self>, DownloadError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(DownloadError::io(path, error)),
        };
        match serde_json::from_slice(&raw) {
            Ok(sidecar) => Ok(Some(sidecar)),
            Err(error) => {
                warn!(path = %path.display(), %error, "headers sidecar is corrupt");
                Ok(None)
            }
        }
    }

    /// Writes the sidecar as pretty JSON.
    pub async fn store(&self, path: &Path) -> Result<(), DownloadError> {
        let body = serde_json::to_vec_pretty(self).map_err(|source| DownloadError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        tokio::fs::write(path, body)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        debug!(path = %path.display(), "saved headers sidecar");
        Ok(())
    }
}

/// Returns the size of `path`, or `None` when it does not exist.
pub(crate) async fn file_len(path: &Path) -> Result<Option<u64>, DownloadError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(DownloadError::io(path, error)),
    }
}

/// Removes `path`, ignoring a missing file.
pub(crate) async fn remove_if_exists(path: &Path) -> Result<(), DownloadError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed");
            Ok(())
        }
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(DownloadError::io(path, error)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::{ETAG, HeaderValue};
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_paths_append_suffixes() {
        let paths = SidecarPaths::for_destination(Path::new("/data/itunes20240101.tbz"));
        assert_eq!(paths.headers, PathBuf::from("/data/itunes20240101.tbz.headers"));
        assert_eq!(paths.partial, PathBuf::from("/data/itunes20240101.tbz.part"));
        assert_eq!(paths.checksum, PathBuf::from("/data/itunes20240101.tbz.md5"));
        assert_eq!(paths.destination, PathBuf::from("/data/itunes20240101.tbz"));
    }

    #[test]
    fn test_capture_records_headers_and_exposes_etag() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("\"abc\""));
        headers.insert(reqwest::header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        let sidecar = HeadersSidecar::capture("https://example.com/a.tbz", &headers);
        assert_eq!(sidecar.etag(), Some("\"abc\""));
        assert_eq!(sidecar.headers.get("accept-ranges").unwrap(), "bytes");
        assert_eq!(sidecar.url, "https://example.com/a.tbz");
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.tbz.headers");
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("\"v1\""));
        let sidecar = HeadersSidecar::capture("https://example.com/a.tbz", &headers);

        sidecar.store(&path).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"url\""), "url recorded: {raw}");

        let loaded = HeadersSidecar::load(&path).await.unwrap();
        assert_eq!(loaded, Some(sidecar));
    }

    #[tokio::test]
    async fn test_load_missing_and_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.tbz.headers");
        assert_eq!(HeadersSidecar::load(&path).await.unwrap(), None);

        std::fs::write(&path, b"{not json").unwrap();
        assert_eq!(HeadersSidecar::load(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_if_exists_tolerates_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone");
        remove_if_exists(&path).await.unwrap();
        std::fs::write(&path, b"x").unwrap();
        remove_if_exists(&path).await.unwrap();
        assert!(!path.exists());
        assert_eq!(file_len(&path).await.unwrap(), None);
    }
}
