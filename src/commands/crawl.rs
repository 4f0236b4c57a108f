//! `epf crawl`: print export URLs below a listing.

use anyhow::Result;
use epf_core::crawler::{CrawlOptions, Crawler};
use tracing::info;

use super::{RunContext, link_filter};
use crate::cli::CrawlArgs;

/// Streams discovered URLs to stdout, one per line.
pub async fn run_crawl_command(ctx: &RunContext, args: &CrawlArgs) -> Result<()> {
    let options = CrawlOptions {
        recursive: !args.no_recursive,
        yield_dirs: args.dirs,
        filter: link_filter(args.pattern.as_deref())?,
        max_depth: args.max_depth,
    };
    let crawler =
        Crawler::new(ctx.http_client()?, options).with_cancellation(ctx.cancellation_token());

    let mut found = 0_usize;
    let mut stream = crawler.crawl(&args.url);
    while let Some(url) = stream.next().await {
        println!("{}", url?);
        found += 1;
    }
    info!(root = %args.url, found, "crawl finished");
    Ok(())
}
