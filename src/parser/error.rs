//! Error types for export decoding.
//!
//! Every variant is fatal for the export it names: the decoder never pads,
//! truncates or guesses its way past a malformed file.

use thiserror::Error;

/// Errors that can occur while decoding an export.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Reading the archive or a member failed.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Archive path or member name.
        file: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A record is not valid UTF-8.
    #[error("{file}: invalid UTF-8 on line {line}")]
    Encoding {
        /// Member name.
        file: String,
        /// One-based line number.
        line: u64,
    },

    /// The trailing `#recordsWritten:` footer is missing or not a number.
    #[error("{file}: unreadable record count footer: {reason}")]
    Footer {
        /// Member name.
        file: String,
        /// What was wrong with the footer.
        reason: String,
    },

    /// The first record is not a `#`-prefixed column list.
    #[error("{file}: missing column header")]
    MissingColumnHeader {
        /// Member name.
        file: String,
    },

    /// A metadata record lacks the `#key:value` shape.
    #[error("{file}: malformed header record {record:?}")]
    MalformedHeader {
        /// Member name.
        file: String,
        /// The offending record.
        record: String,
    },

    /// A required metadata key never appeared.
    #[error("{file}: missing required header {key:?}")]
    MissingHeader {
        /// Member name.
        file: String,
        /// The key that was expected.
        key: &'static str,
    },

    /// `dbTypes` does not list exactly one type per column.
    #[error("{file}: {columns} columns but {types} declared types")]
    SchemaMismatch {
        /// Member name.
        file: String,
        /// Number of column names.
        columns: usize,
        /// Number of declared types.
        types: usize,
    },

    /// A record has the wrong number of fields after repair.
    #[error("{file}: record {record} has {actual} fields, expected {expected}")]
    FieldCount {
        /// Member name.
        file: String,
        /// One-based record index.
        record: u64,
        /// Declared column count.
        expected: usize,
        /// Fields found.
        actual: usize,
    },

    /// The number of decoded records differs from the footer.
    #[error("{file}: footer declares {expected} records, decoded {actual}")]
    RecordCountMismatch {
        /// Member name.
        file: String,
        /// Count from the footer.
        expected: u64,
        /// Records decoded.
        actual: u64,
    },
}

impl ParseError {
    /// Creates an IO error.
    pub fn io(file: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            file: file.into(),
            source,
        }
    }

    /// Creates a footer error.
    pub fn footer(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Footer {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
