//! Deferred cancellation around filesystem mutations.
//!
//! A cancellation request is only observed between mutations. Whatever write,
//! flush or rename is in flight when the token fires runs to completion first,
//! so no sidecar or partial file is left torn.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DownloadError;

/// Cancellation gate bound to one destination.
#[derive(Debug, Clone)]
pub(crate) struct Interrupt {
    token: CancellationToken,
    destination: PathBuf,
}

impl Interrupt {
    pub(crate) fn new(token: CancellationToken, destination: &Path) -> Self {
        Self {
            token,
            destination: destination.to_path_buf(),
        }
    }

    /// Fails with `Cancelled` if cancellation was requested.
    pub(crate) fn checkpoint(&self) -> Result<(), DownloadError> {
        if self.token.is_cancelled() {
            debug!(path = %self.destination.display(), "cancellation observed");
            return Err(DownloadError::cancelled(&self.destination));
        }
        Ok(())
    }

    /// Runs `mutation` to completion, then honors any pending cancellation.
    pub(crate) async fn shielded<T, F>(&self, mutation: F) -> Result<T, DownloadError>
    where
        F: Future<Output = Result<T, DownloadError>>,
    {
        let value = mutation.await?;
        self.checkpoint()?;
        Ok(value)
    }

    /// Awaits a non-mutating future unless cancellation arrives first.
    pub(crate) async fn race<T, F>(&self, operation: F) -> Result<T, DownloadError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(DownloadError::cancelled(&self.destination)),
            value = operation => Ok(value),
        }
    }
}
