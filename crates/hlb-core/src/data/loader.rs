//! CSV loading.

use std::io::Read;
use std::path::Path;

use hlb_common::{Error, Result};

use super::table::{RawRow, RawTable};

/// Read a survey CSV file into a raw table.
///
/// Fails with [`Error::File`] when the file cannot be opened, has no header
/// row, or has rows whose width differs from the header.
pub fn load_csv(path: impl AsRef<Path>) -> Result<RawTable> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| Error::file(path, e))?;
    read_csv(file, &path.display().to_string())
}

/// Read CSV from any reader. `source` names the input in error messages.
///
/// Empty lines are skipped. A line holding only whitespace is a one-field
/// row and fails the width check.
pub fn read_csv<R: Read>(reader: R, source: &str) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| file_error(source, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::File {
            path: source.to_string(),
            message: "no header row".to_string(),
        });
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| file_error(source, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push(RawRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(RawTable::new(headers, rows))
}

/// Error message for a csv failure, with the line when known.
fn file_error(source: &str, err: csv::Error) -> Error {
    let message = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => format!(
            "line {}: expected {} fields, found {}",
            pos.as_ref().map(|p| p.line()).unwrap_or(0),
            expected_len,
            len
        ),
        csv::ErrorKind::Utf8 { pos, .. } => format!(
            "line {}: invalid UTF-8",
            pos.as_ref().map(|p| p.line()).unwrap_or(0)
        ),
        _ => err.to_string(),
    };
    Error::File {
        path: source.to_string(),
        message,
    }
}
