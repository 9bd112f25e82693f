//! Streaming line reader over a JSONL source.

use crate::error::ParseError;
use crate::record::RawRecord;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Outcome of parsing a single line.
#[derive(Debug)]
pub enum ParsedLine {
    /// Empty or whitespace-only line.
    Blank,
    /// A well-formed record.
    Record(RawRecord),
    /// The line could not be parsed into a record.
    Malformed(ParseError),
}

/// Lazy iterator over the lines of a JSONL source.
///
/// Yields 1-based line numbers alongside each parse outcome. The underlying
/// reader is consumed exactly once; I/O errors surface as iterator items and
/// should be treated as fatal by the caller.
pub struct RecordReader<R> {
    lines: io::Lines<R>,
    id_field: String,
    line_number: u64,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R, id_field: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            id_field: id_field.into(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = io::Result<(u64, ParsedLine)>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e)),
        };
        self.line_number += 1;

        let parsed = if line.trim().is_empty() {
            ParsedLine::Blank
        } else {
            match RawRecord::parse(&line, &self.id_field) {
                Ok(record) => ParsedLine::Record(record),
                Err(e) => ParsedLine::Malformed(e),
            }
        };

        Some(Ok((self.line_number, parsed)))
    }
}

/// Open a JSONL file for reading.
pub fn open(path: &Path, id_field: &str) -> io::Result<RecordReader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(RecordReader::new(BufReader::new(file), id_field))
}
