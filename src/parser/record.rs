//! Record framing.
//!
//! Records end with `0x02 0x0A` and may span several physical lines; fields
//! are separated by `0x01`. Only the line that ends with the record delimiter
//! closes a record, so embedded newlines stay part of the field.

use std::io::BufRead;

use super::ParseError;

/// Terminates every record, including header and footer records.
pub const RECORD_DELIMITER: &str = "\x02\n";

/// Separates the fields of a record.
pub const FIELD_DELIMITER: char = '\x01';

/// How a record is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadMode {
    /// Every line counts, comments included.
    Header,
    /// Leading `#` lines are skipped and NUL bytes dropped.
    Data,
}

/// Pulls framed records from a buffered stream.
pub(crate) struct RecordReader<'a, R> {
    inner: &'a mut R,
    file: &'a str,
    line: u64,
}

impl<'a, R: BufRead> RecordReader<'a, R> {
    pub(crate) fn new(inner: &'a mut R, file: &'a str) -> Self {
        Self {
            inner,
            file,
            line: 0,
        }
    }

    /// Reads the next record, or `None` at end of stream.
    ///
    /// The delimiter is stripped. An empty record is returned as `Some("")`.
    pub(crate) fn read_record(&mut self, mode: ReadMode) -> Result<Option<String>, ParseError> {
        let mut record = String::new();
        let mut started = false;
        let mut raw = Vec::new();

        loop {
            raw.clear();
            let read = self
                .inner
                .read_until(b'\n', &mut raw)
                .map_err(|e| ParseError::io(self.file, e))?;
            if read == 0 {
                break;
            }
            self.line += 1;

            if mode == ReadMode::Data {
                raw.retain(|&byte| byte != 0);
            }
            let line = std::str::from_utf8(&raw).map_err(|_| ParseError::Encoding {
                file: self.file.to_string(),
                line: self.line,
            })?;

            if mode == ReadMode::Data && !started && line.starts_with('#') {
                continue;
            }
            started = true;

            if let Some(body) = line.strip_suffix(RECORD_DELIMITER) {
                record.push_str(body);
                break;
            }
            record.push_str(line);
        }

        Ok(started.then_some(record))
    }
}

/// Splits a record body into its fields.
pub(crate) fn split_fields(record: &str) -> Vec<String> {
    record.split(FIELD_DELIMITER).map(str::to_string).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(input: &[u8], mode: ReadMode) -> Vec<Option<String>> {
        let mut cursor = Cursor::new(input.to_vec());
        let mut reader = RecordReader::new(&mut cursor, "test");
        let mut out = Vec::new();
        loop {
            let record = reader.read_record(mode).unwrap();
            let end = record.is_none();
            out.push(record);
            if end {
                return out;
            }
        }
    }

    #[test]
    fn test_record_spans_lines() {
        let records = read_all(b"a\x01multi\nline\x02\nb\x01c\x02\n", ReadMode::Data);
        assert_eq!(
            records,
            vec![
                Some("a\x01multi\nline".to_string()),
                Some("b\x01c".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_data_mode_skips_leading_comments_only() {
        let records = read_all(b"#comment\x02\nx\n#not a comment\x02\n", ReadMode::Data);
        assert_eq!(
            records,
            vec![Some("x\n#not a comment".to_string()), None]
        );
    }

    #[test]
    fn test_header_mode_keeps_comments() {
        let records = read_all(b"#a\x01b\x02\n##legal:x\x02\n", ReadMode::Header);
        assert_eq!(
            records,
            vec![Some("#a\x01b".to_string()), Some("##legal:x".to_string()), None]
        );
    }

    #[test]
    fn test_data_mode_strips_nul_bytes() {
        let records = read_all(b"a\x00b\x01c\x00\x02\n", ReadMode::Data);
        assert_eq!(records[0].as_deref(), Some("ab\x01c"));
    }

    #[test]
    fn test_empty_record_is_distinct_from_eof() {
        let records = read_all(b"\x02\nrest\x02\n", ReadMode::Data);
        assert_eq!(records[0].as_deref(), Some(""));
    }

    #[test]
    fn test_unterminated_tail_is_returned() {
        let records = read_all(b"tail without delimiter", ReadMode::Data);
        assert_eq!(records[0].as_deref(), Some("tail without delimiter"));
    }

    #[test]
    fn test_invalid_utf8_reports_line() {
        let mut cursor = Cursor::new(b"ok\x02\n\xff\xfe\x02\n".to_vec());
        let mut reader = RecordReader::new(&mut cursor, "genre");
        reader.read_record(ReadMode::Data).unwrap();
        let error = reader.read_record(ReadMode::Data).unwrap_err();
        assert!(matches!(error, ParseError::Encoding { line: 2, .. }));
    }

    #[test]
    fn test_split_fields() {
        assert_eq!(split_fields("a\x01\x01c"), vec!["a", "", "c"]);
        assert_eq!(split_fields(""), vec![""]);
    }
}
