//! Raw string table as read from the survey file.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cell spellings treated as missing (compared trimmed, case-insensitively).
const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "nan", "null"];

/// Whether a raw cell is empty or an NA marker.
pub fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    MISSING_MARKERS
        .iter()
        .any(|m| trimmed.eq_ignore_ascii_case(m))
}

/// One data row and the 1-based file line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub cells: Vec<String>,
}

/// Headers and rows with every cell kept as the original string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Missing-cell count of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMissing {
    pub column: String,
    pub missing: usize,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        RawTable { headers, rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.headers.len()
    }

    /// Index of the first header equal to `name` after trimming.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name.trim())
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |r| r.cells.get(index).map(String::as_str).unwrap_or(""))
    }

    /// Per column, the number of empty or NA cells.
    pub fn missing_counts(&self) -> Vec<ColumnMissing> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| ColumnMissing {
                column: h.trim().to_string(),
                missing: self.column(i).filter(|c| is_missing(c)).count(),
            })
            .collect()
    }

    /// Per column, the number of cells equal to `sentinel`.
    pub fn sentinel_counts(&self, sentinel: &str) -> Vec<ColumnMissing> {
        let sentinel = sentinel.trim();
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| ColumnMissing {
                column: h.trim().to_string(),
                missing: self
                    .column(i)
                    .filter(|c| c.trim().eq_ignore_ascii_case(sentinel))
                    .count(),
            })
            .collect()
    }

    /// New table keeping only rows for which `keep` returns true.
    pub fn filter_rows(&self, mut keep: impl FnMut(&RawRow) -> bool) -> RawTable {
        RawTable {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}
