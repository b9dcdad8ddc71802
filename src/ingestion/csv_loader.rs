//! CSV Loader - decodes uploaded bytes and parses them into untyped rows

use crate::encoding::{decode_bytes, detect_delimiter, DetectedEncoding};
use crate::error::Result;
use csv::ReaderBuilder;
use serde_json::{Map, Value};

/// An uploaded table before any typing: ordered rows of column-name to raw cell
/// mappings, plus what was detected about the byte stream. Immutable after load.
#[derive(Clone, Debug)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub encoding: DetectedEncoding,
    pub delimiter: u8,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Decode and parse a CSV byte stream. Cells stay untyped: trimmed strings,
/// with empty cells recorded as null. Typing happens during schema inference.
pub fn load_raw_table(bytes: &[u8]) -> Result<RawTable> {
    let decoded = decode_bytes(bytes)?;
    let delimiter = detect_delimiter(&decoded.text);

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(decoded.text.as_bytes());

    let headers = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut obj = Map::new();
        for (idx, header) in headers.iter().enumerate() {
            let cell = record.get(idx).unwrap_or("").trim();
            let value = if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            obj.insert(header.clone(), value);
        }
        rows.push(obj);
    }

    Ok(RawTable {
        headers,
        rows,
        encoding: decoded.encoding,
        delimiter,
    })
}
