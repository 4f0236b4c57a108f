//! `epf download`: fetch explicit export URLs.

use std::path::Path;

use anyhow::{Context, Result, bail};
use epf_core::download::{DownloadError, DownloadRequest, Downloader, destination_for};
use tracing::{error, info};

use super::RunContext;
use crate::cli::DownloadArgs;

/// Downloads each URL in turn into the output directory.
///
/// A failed URL does not stop the ones after it, except on interrupt. The
/// command fails if any URL failed.
pub async fn run_download_command(ctx: &RunContext, args: &DownloadArgs) -> Result<()> {
    let plan = ctx.transfer_plan(&args.transfer)?;
    tokio::fs::create_dir_all(&plan.output_dir)
        .await
        .with_context(|| format!("Cannot create {}", plan.output_dir.display()))?;

    let mut failed = 0_usize;
    for url in &args.urls {
        match fetch_one(&plan.downloader, url, &plan.output_dir, plan.verify_existing).await {
            Ok(()) => {}
            Err(DownloadError::Cancelled { .. }) => bail!("Interrupted"),
            Err(err) => {
                error!(url = %url, error = %err, "download failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} downloads failed", args.urls.len());
    }
    Ok(())
}

async fn fetch_one(
    downloader: &Downloader,
    url: &str,
    output_dir: &Path,
    verify_existing: bool,
) -> Result<(), DownloadError> {
    let destination = destination_for(url, output_dir)?;
    let request = DownloadRequest::new(url, destination).verify_existing(verify_existing);
    let report = downloader.download(&request).await?;
    info!(
        path = %report.path.display(),
        outcome = ?report.outcome,
        bytes = report.bytes_fetched,
        restarts = report.restarts,
        "download finished"
    );
    println!("{}", report.path.display());
    Ok(())
}
