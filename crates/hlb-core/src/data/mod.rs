//! Survey data layer.
//!
//! - Loading: CSV file to [`RawTable`], every cell kept as a string
//! - Schema: header spellings resolved to [`Column`]
//! - Cleaning: sentinel and missing rows dropped, columns typed, duplicate
//!   identifiers resolved, producing a [`SurveyTable`]

mod clean;
mod loader;
pub mod schema;
mod survey;
mod table;

pub use clean::{
    clean, coerce, drop_unusable_rows, resolve_duplicates, unrecognized_headers, CleanOutcome,
    CleaningOptions, CleaningReport, DataQualityIssue, DuplicateResolution, IssueKind,
};
pub use loader::{load_csv, read_csv};
pub use schema::{normalize_header, Column, ColumnKind};
pub use survey::{Factor, Outcome, SurveyRecord, SurveyTable};
pub use table::{is_missing, ColumnMissing, RawRow, RawTable};
