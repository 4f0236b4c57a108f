//! Decoder for EPF export files.
//!
//! An export is a `.tbz` archive holding one text file per table. Each table
//! file looks like
//!
//! ```text
//! #export_date^Agenre_id^Aname^B
//! #primaryKey:genre_id^B
//! #dbTypes:BIGINT^AINTEGER^AVARCHAR(200)^B
//! #exportMode:FULL^B
//! 1306234802000^A34^AMusic^B
//! #recordsWritten:1^B
//! ```
//!
//! where `^A` is the field delimiter `0x01` and `^B` the record delimiter
//! `0x02 0x0A`.
//!
//! # Example
//!
//! ```no_run
//! use epf_core::parser::parse;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), epf_core::parser::ParseError> {
//! let mut source = parse(Path::new("itunes20240101.tbz"))?;
//! for export in source.exports()? {
//!     let mut export = export?;
//!     println!("{}: {} records", export.file_name(), export.records_expected());
//!     for record in export.records()? {
//!         let fields = record?;
//!         println!("{}", fields.join(" | "));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod archive;
mod error;
mod export;
mod header;
mod record;
mod repair;

pub use archive::{ExportSource, Exports, FileExport};
pub use error::ParseError;
pub use export::{ExportSummary, Records, TableExport};
pub use header::{Column, FOOTER_WINDOW};
pub use record::{FIELD_DELIMITER, RECORD_DELIMITER};

use std::path::Path;

/// Opens an export archive or raw table file for decoding.
///
/// # Errors
///
/// Returns [`ParseError::Io`] if the file cannot be opened.
pub fn parse(path: &Path) -> Result<ExportSource, ParseError> {
    ExportSource::open(path)
}
