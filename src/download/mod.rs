//! Resumable, checksum-verified downloads of feed exports.
//!
//! A download is driven by [`Downloader`] and persists its state in three
//! sidecar files next to the destination, so an interrupted transfer resumes
//! from the last byte on disk instead of starting over.
//!
//! # Features
//!
//! - Byte-range resume with a 10-byte overlap check at the resume point
//! - Entity-tag tracking that discards local state when the export changes
//! - MD5 verification against the published `<url>.md5` reference
//! - Fixed retry budget for failing range fetches
//! - Cancellation that never interrupts a filesystem write

mod checksum;
mod client;
pub mod constants;
mod engine;
mod error;
mod filename;
mod interrupt;
mod progress;
mod retry;
mod sidecar;

pub use checksum::{file_md5, reference_matches, verify_file};
pub use client::{Credentials, HttpClient};
pub use engine::{DownloadConfig, DownloadOutcome, DownloadReport, DownloadRequest, Downloader};
pub use error::{DownloadError, FailureType, classify_error};
pub use filename::{destination_for, mirror_destination};
pub use progress::{RateHistory, format_duration, format_size};
pub use retry::{RetryBudget, RetryDecision};
pub use sidecar::{HeadersSidecar, SidecarPaths};
