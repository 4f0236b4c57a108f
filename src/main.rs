//! CLI entry point for the EPF feed client.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;
mod commands;
mod config;

use cli::{Args, Command};
use commands::RunContext;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let file_config = config::load_file_config(args.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config file > info
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => file_config
                .verbosity
                .map_or("info", config::VerbositySetting::log_level),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?file_config, "config loaded");
    info!("epf starting");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current write");
            interrupt.cancel();
        }
    });

    let ctx = RunContext::new(&args, file_config, cancel);
    match &args.command {
        Command::Crawl(crawl) => commands::run_crawl_command(&ctx, crawl).await,
        Command::Download(download) => commands::run_download_command(&ctx, download).await,
        Command::Sync(sync) => commands::run_sync_command(&ctx, sync).await,
        Command::Parse(parse) => commands::run_parse_command(parse.clone()).await,
    }
}
