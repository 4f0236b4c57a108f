//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Crawl, download and decode EPF data exports.
///
/// Downloads resume where they stopped and are verified against the
/// published MD5 checksum before they are considered done.
#[derive(Parser, Debug)]
#[command(name = "epf")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/epf/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Feed account name
    #[arg(long, env = "EPF_USERNAME", global = true)]
    pub username: Option<String>,

    /// Feed account password
    #[arg(long, env = "EPF_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the export URLs found below a listing URL
    Crawl(CrawlArgs),
    /// Download export archives one after another
    Download(DownloadArgs),
    /// Crawl a listing and download every archive it contains
    Sync(SyncArgs),
    /// Print a JSON summary of every table in an export
    Parse(ParseArgs),
}

/// Options shared by commands that download.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct TransferArgs {
    /// Directory to store downloads in (default: current directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Re-verify files that already exist instead of trusting them
    #[arg(long)]
    pub verify: bool,

    /// Range-fetch retry budget per file (0-100)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub retries: Option<u32>,

    /// Seconds to wait between range-fetch retries (0-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub retry_wait: Option<u64>,
}

/// Arguments of `crawl`.
#[derive(ClapArgs, Debug, Clone)]
pub struct CrawlArgs {
    /// Listing URL to start from
    pub url: String,

    /// Also print directory URLs
    #[arg(long)]
    pub dirs: bool,

    /// Do not descend into subdirectories
    #[arg(long)]
    pub no_recursive: bool,

    /// Only follow links matching this regular expression
    #[arg(short = 'm', long = "match", value_name = "REGEX")]
    pub pattern: Option<String>,

    /// Deepest listing level to fetch, the start URL being 0
    #[arg(long)]
    pub max_depth: Option<usize>,
}

/// Arguments of `download`.
#[derive(ClapArgs, Debug, Clone)]
pub struct DownloadArgs {
    /// Export URLs
    #[arg(required = true)]
    pub urls: Vec<String>,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Arguments of `sync`.
#[derive(ClapArgs, Debug, Clone)]
pub struct SyncArgs {
    /// Listing URL to mirror
    pub url: String,

    /// Only follow links matching this regular expression
    #[arg(short = 'm', long = "match", value_name = "REGEX")]
    pub pattern: Option<String>,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Arguments of `parse`.
#[derive(ClapArgs, Debug, Clone)]
pub struct ParseArgs {
    /// Export archive or raw table file
    pub path: PathBuf,

    /// Decode every record and compare the count with the footer
    #[arg(long)]
    pub verify_count: bool,

    /// Include the first N records of each table
    #[arg(long, value_name = "N")]
    pub sample: Option<usize>,
}
