//! Export header and footer parsing.

use std::collections::HashMap;
use std::io::{BufRead, Read, Seek, SeekFrom};

use serde::Serialize;
use tracing::debug;

use super::ParseError;
use super::record::{FIELD_DELIMITER, RECORD_DELIMITER, ReadMode, RecordReader, split_fields};

/// Size of the trailing window that holds the record-count footer.
pub const FOOTER_WINDOW: u64 = 40;

const FOOTER_KEY: &str = "#recordsWritten:";
const LEGAL_PREFIX: &str = "##legal:";
const METADATA_RECORDS: usize = 6;

const DB_TYPES: &str = "dbTypes";
const PRIMARY_KEY: &str = "primaryKey";
const EXPORT_MODE: &str = "exportMode";
const REQUIRED: [&str; 3] = [DB_TYPES, PRIMARY_KEY, EXPORT_MODE];
const INCREMENTAL: &str = "INCREMENTAL";

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared SQL type, e.g. `VARCHAR(1000)`.
    pub db_type: String,
}

/// Everything the header records declare about an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Schema {
    pub(crate) columns: Vec<Column>,
    pub(crate) primary_keys: Vec<String>,
    pub(crate) incremental: bool,
}

/// Reads the record count declared by the footer.
pub(crate) fn read_footer<R: Read + Seek>(reader: &mut R, file: &str) -> Result<u64, ParseError> {
    let len = reader
        .seek(SeekFrom::End(0))
        .map_err(|e| ParseError::io(file, e))?;
    reader
        .seek(SeekFrom::Start(len.saturating_sub(FOOTER_WINDOW)))
        .map_err(|e| ParseError::io(file, e))?;
    let mut tail = Vec::new();
    reader
        .read_to_end(&mut tail)
        .map_err(|e| ParseError::io(file, e))?;

    // The window may cut a multi-byte character in half.
    let text = String::from_utf8_lossy(&tail);
    let (_, after_key) = text
        .rsplit_once(FOOTER_KEY)
        .ok_or_else(|| ParseError::footer(file, format!("no {FOOTER_KEY} marker")))?;
    let (count, _) = after_key
        .rsplit_once(RECORD_DELIMITER)
        .ok_or_else(|| ParseError::footer(file, "unterminated footer record"))?;
    count
        .trim()
        .parse()
        .map_err(|_| ParseError::footer(file, format!("{count:?} is not a record count")))
}

/// Reads the column header and metadata records from the start of the stream.
pub(crate) fn read_schema<R: BufRead + Seek>(
    reader: &mut R,
    file: &str,
) -> Result<Schema, ParseError> {
    reader
        .seek(SeekFrom::Start(0))
        .map_err(|e| ParseError::io(file, e))?;
    let mut records = RecordReader::new(reader, file);

    let names = records
        .read_record(ReadMode::Header)?
        .and_then(|record| record.strip_prefix('#').map(split_fields))
        .ok_or_else(|| ParseError::MissingColumnHeader {
            file: file.to_string(),
        })?;

    let mut metadata: HashMap<String, Vec<String>> = HashMap::new();
    for _ in 0..METADATA_RECORDS {
        let Some(record) = records.read_record(ReadMode::Header)? else {
            continue;
        };
        if record.is_empty() || record.starts_with(LEGAL_PREFIX) {
            continue;
        }
        // Short header blocks are followed directly by data.
        if !record.starts_with('#') {
            break;
        }
        let (key, value) = record
            .strip_prefix('#')
            .and_then(|rest| rest.split_once(':'))
            .ok_or_else(|| ParseError::MalformedHeader {
                file: file.to_string(),
                record: record.clone(),
            })?;
        if !REQUIRED.iter().any(|required| *required == key) {
            debug!(file, key, "ignoring unknown header");
        }
        metadata.insert(
            key.to_string(),
            value.split(FIELD_DELIMITER).map(str::to_string).collect(),
        );
    }

    let mut take = |key: &'static str| {
        metadata.remove(key).ok_or_else(|| ParseError::MissingHeader {
            file: file.to_string(),
            key,
        })
    };
    let types = take(DB_TYPES)?;
    let primary_keys = take(PRIMARY_KEY)?;
    let export_mode = take(EXPORT_MODE)?;

    if types.len() != names.len() {
        return Err(ParseError::SchemaMismatch {
            file: file.to_string(),
            columns: names.len(),
            types: types.len(),
        });
    }

    let columns = names
        .into_iter()
        .zip(types)
        .map(|(name, db_type)| Column { name, db_type })
        .collect();
    Ok(Schema {
        columns,
        primary_keys: primary_keys.into_iter().filter(|key| !key.is_empty()).collect(),
        incremental: export_mode.first().is_some_and(|mode| mode == INCREMENTAL),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GENRE: &[u8] = b"#export_date\x01genre_id\x01name\x02\n\
#primaryKey:genre_id\x01\x02\n\
#dbTypes:BIGINT\x01INTEGER\x01VARCHAR(200)\x02\n\
##legal:Licensed content\x02\n\
#exportMode:INCREMENTAL\x02\n\
1\x0134\x01Music\x02\n\
#recordsWritten:1\x02\n";

    #[test]
    fn test_read_footer() {
        let mut cursor = Cursor::new(GENRE.to_vec());
        assert_eq!(read_footer(&mut cursor, "genre").unwrap(), 1);
    }

    #[test]
    fn test_read_footer_short_file() {
        let mut cursor = Cursor::new(b"#recordsWritten:7\x02\n".to_vec());
        assert_eq!(read_footer(&mut cursor, "tiny").unwrap(), 7);
    }

    #[test]
    fn test_read_footer_rejects_garbage() {
        let mut cursor = Cursor::new(b"no footer here\x02\n".to_vec());
        assert!(matches!(
            read_footer(&mut cursor, "x"),
            Err(ParseError::Footer { .. })
        ));
        let mut cursor = Cursor::new(b"#recordsWritten:many\x02\n".to_vec());
        assert!(matches!(
            read_footer(&mut cursor, "x"),
            Err(ParseError::Footer { .. })
        ));
    }

    #[test]
    fn test_read_schema() {
        let mut cursor = Cursor::new(GENRE.to_vec());
        let schema = read_schema(&mut cursor, "genre").unwrap();
        let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["export_date", "genre_id", "name"]);
        assert_eq!(schema.columns[2].db_type, "VARCHAR(200)");
        assert_eq!(schema.primary_keys, ["genre_id"]);
        assert!(schema.incremental);
    }

    #[test]
    fn test_read_schema_full_export() {
        let input = b"#a\x02\n#primaryKey:\x02\n#dbTypes:INTEGER\x02\n#exportMode:FULL\x02\n";
        let schema = read_schema(&mut Cursor::new(input.to_vec()), "t").unwrap();
        assert!(!schema.incremental);
        assert!(schema.primary_keys.is_empty());
    }

    #[test]
    fn test_read_schema_missing_key() {
        let input = b"#a\x02\n#primaryKey:a\x02\n#exportMode:FULL\x02\n";
        let error = read_schema(&mut Cursor::new(input.to_vec()), "t").unwrap_err();
        assert!(matches!(
            error,
            ParseError::MissingHeader {
                key: "dbTypes",
                ..
            }
        ));
    }

    #[test]
    fn test_read_schema_malformed_record() {
        let input = b"#a\x02\n#primaryKey a\x02\n";
        let error = read_schema(&mut Cursor::new(input.to_vec()), "t").unwrap_err();
        assert!(matches!(error, ParseError::MalformedHeader { .. }));
    }

    #[test]
    fn test_read_schema_rejects_malformed_record_after_required_keys() {
        let input = b"#a\x02\n#primaryKey:a\x02\n#dbTypes:INTEGER\x02\n#exportMode:FULL\x02\n#bogus\x02\n1\x02\n";
        let error = read_schema(&mut Cursor::new(input.to_vec()), "t").unwrap_err();
        match error {
            ParseError::MalformedHeader { record, .. } => assert_eq!(record, "#bogus"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_read_schema_stops_at_first_data_record() {
        let input = b"#a\x02\n#primaryKey:a\x02\n#dbTypes:INTEGER\x02\n#exportMode:FULL\x02\n7\x02\n8:x\x02\n";
        let schema = read_schema(&mut Cursor::new(input.to_vec()), "t").unwrap();
        assert_eq!(schema.columns.len(), 1);
    }

    #[test]
    fn test_read_schema_type_count_mismatch() {
        let input = b"#a\x01b\x02\n#primaryKey:a\x02\n#dbTypes:INTEGER\x02\n#exportMode:FULL\x02\n";
        let error = read_schema(&mut Cursor::new(input.to_vec()), "t").unwrap_err();
        assert!(matches!(
            error,
            ParseError::SchemaMismatch {
                columns: 2,
                types: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_read_schema_requires_hash_prefix() {
        let input = b"a\x01b\x02\n";
        let error = read_schema(&mut Cursor::new(input.to_vec()), "t").unwrap_err();
        assert!(matches!(error, ParseError::MissingColumnHeader { .. }));
    }
}
