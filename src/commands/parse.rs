//! `epf parse`: describe the tables of an export.

use std::io::{self, Write};

use anyhow::{Context, Result};
use epf_core::parser::{ExportSummary, FileExport, parse};
use serde::Serialize;
use tracing::info;

use crate::cli::ParseArgs;

/// One output line per table.
#[derive(Debug, Serialize)]
struct TableReport {
    #[serde(flatten)]
    summary: ExportSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    verified_records: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample: Option<Vec<Vec<String>>>,
}

/// Prints a JSON line per table in `args.path`.
///
/// Decoding is blocking work, so it runs off the async runtime.
pub async fn run_parse_command(args: ParseArgs) -> Result<()> {
    tokio::task::spawn_blocking(move || parse_blocking(&args))
        .await
        .context("Parser task failed")?
}

fn parse_blocking(args: &ParseArgs) -> Result<()> {
    let mut source = parse(&args.path)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut tables = 0_usize;
    for export in source.exports()? {
        let report = table_report(export?, args)?;
        serde_json::to_writer(&mut out, &report)?;
        writeln!(out)?;
        tables += 1;
    }
    out.flush()?;
    info!(path = %args.path.display(), tables, "parse finished");
    Ok(())
}

fn table_report(mut export: FileExport, args: &ParseArgs) -> Result<TableReport> {
    let summary = export.summary();
    let sample = match args.sample {
        Some(limit) => Some(
            export
                .records()?
                .take(limit)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };
    let verified_records = if args.verify_count {
        Some(export.verify_record_count()?)
    } else {
        None
    };
    Ok(TableReport {
        summary,
        verified_records,
        sample,
    })
}
