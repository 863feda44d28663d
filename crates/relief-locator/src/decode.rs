/// CSV decoding for uploaded relief-centre files.
///
/// Produces the header and one `RawRow` per data record. Text is read as UTF-8,
/// falling back to Latin-1 for legacy exports. The delimiter is whichever of
/// `,` `;` tab `|` occurs most often in the header line.
use std::borrow::Cow;

use tracing::{debug, warn};

use relief_core::model::{RawRow, RawValue};

use crate::error::AppError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

#[derive(Debug, Clone)]
pub struct DecodedTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

pub fn decode_csv(bytes: &[u8]) -> Result<DecodedTable, AppError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = decode_text(bytes);

    let header_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| AppError::Decode("file is empty".to_string()))?;
    let delimiter = sniff_delimiter(header_line);
    debug!(delimiter = %(delimiter as char).escape_default(), "csv delimiter chosen");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::Decode(format!("failed to read header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.iter().all(|c| c.is_empty()) {
        return Err(AppError::Decode("header row has no column names".to_string()));
    }

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(record = index + 1, error = %e, "skipping malformed csv record");
                continue;
            }
        };
        let row: RawRow = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value = record.get(i).map(RawValue::from_text).unwrap_or(RawValue::Empty);
                (column.clone(), value)
            })
            .collect();
        rows.push(row);
    }

    Ok(DecodedTable { columns, rows })
}

fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            warn!("upload is not valid utf-8, decoding as latin-1");
            Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())
        }
    }
}

fn sniff_delimiter(header_line: &str) -> u8 {
    CANDIDATE_DELIMITERS
        .iter()
        .copied()
        .max_by_key(|&d| header_line.bytes().filter(|&b| b == d).count())
        .filter(|&d| header_line.as_bytes().contains(&d))
        .unwrap_or(b',')
}
