//! MD5 verification against the published checksum reference.
//!
//! The reference file is a single line such as
//! `MD5 (itunes20240101.tbz) = 0cc175b9c0f1b6a831c399e269772661`. A candidate
//! verifies when any line of the reference contains its hex digest.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, error, instrument};

use super::DownloadError;
use super::constants::CHUNK_SIZE;

/// Computes the lowercase hex MD5 digest of a file.
///
/// Hashing runs on the blocking pool so the runtime stays responsive for
/// multi-gigabyte exports.
pub async fn file_md5(path: &Path) -> Result<String, DownloadError> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || digest_file(&owned))
        .await
        .map_err(|join| DownloadError::io(path, std::io::Error::other(join)))?
}

fn digest_file(path: &Path) -> Result<String, DownloadError> {
    let file = File::open(path).map_err(|e| DownloadError::io(path, e))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut context = md5::Context::new();
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| DownloadError::io(path, e))?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Returns true when some line of `reference` contains `digest`.
#[must_use]
pub fn reference_matches(reference: &str, digest: &str) -> bool {
    let digest = digest.to_ascii_lowercase();
    reference
        .lines()
        .any(|line| line.to_ascii_lowercase().contains(&digest))
}

/// Verifies `candidate` against the checksum sidecar at `reference_path`.
#[instrument(level = "debug", skip_all, fields(path = %candidate.display()))]
pub async fn verify_file(candidate: &Path, reference_path: &Path) -> Result<bool, DownloadError> {
    let reference = tokio::fs::read_to_string(reference_path)
        .await
        .map_err(|e| DownloadError::io(reference_path, e))?;
    let digest = file_md5(candidate).await?;
    let matches = reference_matches(&reference, &digest);
    if matches {
        debug!(%digest, "checksum verified");
    } else {
        error!(%digest, reference = %reference.trim(), "wrong checksum");
    }
    Ok(matches)
}

/// Checks that an existing sidecar mentions the feed marker.
pub async fn ensure_marker(reference_path: &Path, marker: &str) -> Result<(), DownloadError> {
    let reference = tokio::fs::read_to_string(reference_path)
        .await
        .map_err(|e| DownloadError::io(reference_path, e))?;
    if reference.contains(marker) {
        Ok(())
    } else {
        Err(DownloadError::InvalidChecksumSidecar {
            path: reference_path.to_path_buf(),
            marker: marker.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reference_matches_any_line_case_insensitive() {
        let reference = "first line\nMD5 (a.tbz) = 0CC175B9C0F1B6A831C399E269772661\n";
        assert!(reference_matches(reference, "0cc175b9c0f1b6a831c399e269772661"));
        assert!(!reference_matches(reference, "900150983cd24fb0d6963f7d28e17f72"));
    }

    #[tokio::test]
    async fn test_file_md5_known_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_md5(&path).await.unwrap(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[tokio::test]
    async fn test_verify_file_against_sidecar() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.tbz");
        let reference = temp.path().join("a.tbz.md5");
        std::fs::write(&path, b"abc").unwrap();
        std::fs::write(
            &reference,
            "MD5 (a.tbz) = 900150983cd24fb0d6963f7d28e17f72\n",
        )
        .unwrap();
        assert!(verify_file(&path, &reference).await.unwrap());

        std::fs::write(&path, b"abd").unwrap();
        assert!(!verify_file(&path, &reference).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_marker() {
        let temp = TempDir::new().unwrap();
        let reference = temp.path().join("a.tbz.md5");
        std::fs::write(&reference, "MD5 (a.tbz) = 00").unwrap();
        ensure_marker(&reference, "tbz").await.unwrap();

        std::fs::write(&reference, "<html>not found</html>").unwrap();
        let result = ensure_marker(&reference, "tbz").await;
        assert!(matches!(
            result,
            Err(DownloadError::InvalidChecksumSidecar { .. })
        ));
    }
}
