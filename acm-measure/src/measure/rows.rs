//! Input CSV row stream

use csv::{ByteRecord, ByteRecordsIntoIter, ReaderBuilder};
use std::fs::File;
use std::path::Path;

use super::options::ColumnLayout;
use super::MeasureError;

/// One input record with its grouping key
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 1-based data row number (header excluded)
    pub number: u64,
    pub fields: Vec<String>,
    pub transcript: String,
    pub speaker: String,
}

impl Row {
    pub fn new(number: u64, fields: Vec<String>, layout: &ColumnLayout) -> Self {
        let field = |i: usize| fields.get(i).cloned().unwrap_or_default();
        let transcript = field(layout.transcript);
        let speaker = field(layout.speaker);
        Self {
            number,
            fields,
            transcript,
            speaker,
        }
    }

    /// Whether `other` belongs in the same batch
    pub fn same_key(&self, other: &Row) -> bool {
        self.transcript == other.transcript && self.speaker == other.speaker
    }
}

/// Streaming reader over the data rows of an input CSV
///
/// Fields are decoded lossily; bytes that are not UTF-8 become U+FFFD.
pub struct RowSource {
    headers: Vec<String>,
    records: ByteRecordsIntoIter<File>,
    layout: ColumnLayout,
    next_number: u64,
}

impl RowSource {
    /// Open `path` and read its header row
    pub fn open(path: &Path, delimiter: u8, layout: ColumnLayout) -> Result<Self, MeasureError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let headers = decode(reader.byte_headers()?);
        Ok(Self {
            headers,
            records: reader.into_byte_records(),
            layout,
            next_number: 1,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn to_row(&mut self, record: ByteRecord) -> Row {
        let number = self.next_number;
        self.next_number += 1;
        Row::new(number, decode(&record), &self.layout)
    }
}

fn decode(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

impl Iterator for RowSource {
    type Item = Result<Row, MeasureError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.records.next()? {
            Ok(record) => Some(Ok(self.to_row(record))),
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Count data rows in `path` (header excluded)
pub fn count_rows(path: &Path, delimiter: u8) -> Result<u64, MeasureError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut record = csv::ByteRecord::new();
    let mut count = 0;
    while reader.read_byte_record(&mut record)? {
        count += 1;
    }
    Ok(count)
}
