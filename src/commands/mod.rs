//! CLI command handlers.

mod crawl;
mod download;
mod parse;
mod sync;

pub use crawl::run_crawl_command;
pub use download::run_download_command;
pub use parse::run_parse_command;
pub use sync::run_sync_command;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use epf_core::crawler::LinkFilter;
use epf_core::download::{Credentials, DownloadConfig, Downloader, HttpClient};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::{Args, TransferArgs};
use crate::config::FileConfig;

/// Effective settings after merging CLI flags, environment and config file.
#[derive(Debug, Clone)]
pub struct RunContext {
    credentials: Option<Credentials>,
    file: FileConfig,
    cancel: CancellationToken,
}

/// Resolved options for one downloading command.
pub(crate) struct TransferPlan {
    pub(crate) downloader: Downloader,
    pub(crate) output_dir: PathBuf,
    pub(crate) verify_existing: bool,
}

impl RunContext {
    /// Merges settings; CLI flags and `EPF_*` variables win over the file.
    pub fn new(args: &Args, file: FileConfig, cancel: CancellationToken) -> Self {
        let username = args.username.clone().or_else(|| file.username.clone());
        let password = args.password.clone().or_else(|| file.password.clone());
        let credentials = username.map(|username| Credentials { username, password });
        debug!(authenticated = credentials.is_some(), "resolved credentials");
        Self {
            credentials,
            file,
            cancel,
        }
    }

    fn connect_timeout(&self) -> Duration {
        self.file
            .connect_timeout_secs
            .map_or_else(|| DownloadConfig::default().connect_timeout, Duration::from_secs)
    }

    /// Builds an authenticated HTTP client.
    pub(crate) fn http_client(&self) -> Result<HttpClient> {
        HttpClient::with_connect_timeout(self.credentials.clone(), self.connect_timeout())
            .context("Failed to build HTTP client")
    }

    /// Token cancelled on Ctrl-C.
    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves downloader settings for a command.
    pub(crate) fn transfer_plan(&self, transfer: &TransferArgs) -> Result<TransferPlan> {
        let defaults = DownloadConfig::default();
        let config = DownloadConfig {
            credentials: self.credentials.clone(),
            retries: transfer
                .retries
                .or(self.file.retries)
                .unwrap_or(defaults.retries),
            retry_wait: transfer
                .retry_wait
                .or(self.file.retry_wait_secs)
                .map_or(defaults.retry_wait, Duration::from_secs),
            checksum_marker: self
                .file
                .checksum_marker
                .clone()
                .unwrap_or(defaults.checksum_marker),
            connect_timeout: self.connect_timeout(),
        };
        let downloader = Downloader::with_client(self.http_client()?, config)
            .with_cancellation(self.cancellation_token());
        let output_dir = transfer
            .output_dir
            .clone()
            .or_else(|| self.file.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(TransferPlan {
            downloader,
            output_dir,
            verify_existing: transfer.verify || self.file.verify_existing.unwrap_or(false),
        })
    }
}

/// Compiles an optional `--match` pattern into a crawler link filter.
pub(crate) fn link_filter(pattern: Option<&str>) -> Result<Option<LinkFilter>> {
    let Some(pattern) = pattern else {
        return Ok(None);
    };
    let regex = Regex::new(pattern).with_context(|| format!("Invalid --match pattern '{pattern}'"))?;
    let filter: LinkFilter = std::sync::Arc::new(move |link: &str| regex.is_match(link));
    Ok(Some(filter))
}
