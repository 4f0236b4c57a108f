//! Decoded table exports and their record streams.

use std::io::{BufRead, Seek, SeekFrom};

use serde::Serialize;
use tracing::{debug, instrument};

use super::ParseError;
use super::header::{Column, read_footer, read_schema};
use super::record::{ReadMode, RecordReader, split_fields};
use super::repair::DescriptionRepair;

/// One table of an export, bound to its open stream.
#[derive(Debug)]
pub struct TableExport<R> {
    file_name: String,
    records_expected: u64,
    columns: Vec<Column>,
    primary_keys: Vec<String>,
    incremental: bool,
    repair: Option<DescriptionRepair>,
    reader: R,
}

/// Serializable description of a [`TableExport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Member or file name.
    pub file_name: String,
    /// Record count declared by the footer.
    pub records_expected: u64,
    /// Declared columns in order.
    pub columns: Vec<Column>,
    /// Primary key column names.
    pub primary_keys: Vec<String>,
    /// Whether the export only carries changes since the last full export.
    pub incremental: bool,
}

impl<R: BufRead + Seek> TableExport<R> {
    /// Decodes the footer and header records of `reader`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the footer, column header or a required
    /// metadata record is missing or malformed.
    #[instrument(level = "debug", skip(reader, file_name), fields(file = tracing::field::Empty))]
    pub fn from_reader(mut reader: R, file_name: impl Into<String>) -> Result<Self, ParseError> {
        let file_name = file_name.into();
        tracing::Span::current().record("file", file_name.as_str());

        let records_expected = read_footer(&mut reader, &file_name)?;
        let schema = read_schema(&mut reader, &file_name)?;
        debug!(
            records_expected,
            columns = schema.columns.len(),
            incremental = schema.incremental,
            "decoded export header"
        );

        let repair = DescriptionRepair::for_export(&file_name, &schema.columns);
        Ok(Self {
            file_name,
            records_expected,
            columns: schema.columns,
            primary_keys: schema.primary_keys,
            incremental: schema.incremental,
            repair,
            reader,
        })
    }

    /// Starts a fresh pass over the records from the top of the stream.
    ///
    /// Each call rewinds, so a pass can be restarted at any time.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] if the stream cannot be rewound.
    pub fn records(&mut self) -> Result<Records<'_, R>, ParseError> {
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| ParseError::io(&self.file_name, e))?;
        Ok(Records {
            reader: RecordReader::new(&mut self.reader, &self.file_name),
            file: &self.file_name,
            expected: self.columns.len(),
            repair: self.repair,
            index: 0,
            finished: false,
        })
    }

    /// Decodes every record and checks the total against the footer.
    ///
    /// # Errors
    ///
    /// Returns the first decoding error, or
    /// [`ParseError::RecordCountMismatch`] when the counts differ.
    pub fn verify_record_count(&mut self) -> Result<u64, ParseError> {
        let mut actual = 0_u64;
        for record in self.records()? {
            record?;
            actual += 1;
        }
        if actual != self.records_expected {
            return Err(ParseError::RecordCountMismatch {
                file: self.file_name.clone(),
                expected: self.records_expected,
                actual,
            });
        }
        Ok(actual)
    }
}

impl<R> TableExport<R> {
    /// Member path inside the archive, or the base name of a raw file.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Record count declared by the footer.
    #[must_use]
    pub fn records_expected(&self) -> u64 {
        self.records_expected
    }

    /// Declared columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Primary key column names, empty entries removed.
    #[must_use]
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    /// Whether the export only carries changes.
    #[must_use]
    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    /// Describes the export without touching the stream.
    #[must_use]
    pub fn summary(&self) -> ExportSummary {
        ExportSummary {
            file_name: self.file_name.clone(),
            records_expected: self.records_expected,
            columns: self.columns.clone(),
            primary_keys: self.primary_keys.clone(),
            incremental: self.incremental,
        }
    }

    /// Releases the underlying stream.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Lazy pass over the records of a [`TableExport`].
///
/// Ends at end of stream or at the first empty record. A decoding error is
/// yielded once and ends the pass.
pub struct Records<'a, R> {
    reader: RecordReader<'a, R>,
    file: &'a str,
    expected: usize,
    repair: Option<DescriptionRepair>,
    index: u64,
    finished: bool,
}

impl<R: BufRead> Iterator for Records<'_, R> {
    type Item = Result<Vec<String>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let raw = match self.reader.read_record(ReadMode::Data) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => {
                self.finished = true;
                return None;
            }
            Err(error) => {
                self.finished = true;
                return Some(Err(error));
            }
        };
        self.index += 1;

        let mut fields = split_fields(&raw);
        if fields.len() > self.expected
            && let Some(repair) = self.repair
        {
            fields = repair.apply(fields);
        }
        if fields.len() != self.expected {
            self.finished = true;
            return Some(Err(ParseError::FieldCount {
                file: self.file.to_string(),
                record: self.index,
                expected: self.expected,
                actual: fields.len(),
            }));
        }
        Some(Ok(fields))
    }
}
