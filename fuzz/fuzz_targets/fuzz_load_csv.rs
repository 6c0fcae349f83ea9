//! Fuzz target for survey CSV loading and cleaning.
//!
//! Arbitrary bytes must either load and clean or return an error.

#![no_main]

use hlb_core::data::{clean, read_csv, CleaningOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = read_csv(data, "fuzz") {
        if let Ok(outcome) = clean(&raw, &CleaningOptions::default()) {
            assert_eq!(outcome.report.rows_out, outcome.table.len());
            assert!(outcome.report.rows_out <= raw.n_rows());
        }
    }
});
