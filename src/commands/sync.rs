//! `epf sync`: mirror every archive below a listing.

use anyhow::{Context, Result, bail};
use epf_core::crawler::{CrawlOptions, Crawler};
use epf_core::download::{DownloadError, DownloadRequest, mirror_destination};
use tracing::{error, info};

use super::{RunContext, link_filter};
use crate::cli::SyncArgs;

/// Crawls `args.url` and downloads each archive as soon as it is found.
///
/// Files land under the output directory at their path relative to the
/// listing root.
pub async fn run_sync_command(ctx: &RunContext, args: &SyncArgs) -> Result<()> {
    let plan = ctx.transfer_plan(&args.transfer)?;
    let options = CrawlOptions {
        filter: link_filter(args.pattern.as_deref())?,
        ..CrawlOptions::default()
    };
    let crawler =
        Crawler::new(ctx.http_client()?, options).with_cancellation(ctx.cancellation_token());

    let mut attempted = 0_usize;
    let mut failed = 0_usize;
    let mut stream = crawler.crawl(&args.url);
    while let Some(url) = stream.next().await {
        let url = url?;
        let destination = mirror_destination(&args.url, &url, &plan.output_dir)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }

        attempted += 1;
        let request = DownloadRequest::new(url.as_str(), destination)
            .verify_existing(plan.verify_existing);
        match plan.downloader.download(&request).await {
            Ok(report) => {
                info!(
                    path = %report.path.display(),
                    outcome = ?report.outcome,
                    bytes = report.bytes_fetched,
                    "synced"
                );
                println!("{}", report.path.display());
            }
            Err(DownloadError::Cancelled { .. }) => bail!("Interrupted"),
            Err(err) => {
                error!(url = %url, error = %err, "download failed");
                failed += 1;
            }
        }
    }

    info!(root = %args.url, attempted, failed, "sync finished");
    if failed > 0 {
        bail!("{failed} of {attempted} downloads failed");
    }
    Ok(())
}
