//! EPF feed core library.
//!
//! Crawls the feed's directory listings, mirrors export archives with
//! resumable, checksum-verified downloads, and decodes the delimited table
//! files inside them.
//!
//! # Architecture
//!
//! - [`crawler`] - Discovers export URLs from directory-listing pages
//! - [`download`] - Resumable HTTP downloads with sidecar state
//! - [`parser`] - Decoder for `.tbz` exports and raw table files

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crawler;
pub mod download;
pub mod parser;
mod user_agent;

// Re-export commonly used types
pub use crawler::{CrawlError, CrawlOptions, CrawlStream, Crawler};
pub use download::{
    Credentials, DownloadConfig, DownloadError, DownloadOutcome, DownloadReport, DownloadRequest,
    Downloader, FailureType, HttpClient, classify_error,
};
pub use parser::{ExportSource, ParseError, TableExport, parse};
