//! Fuzz target for analysis.json parsing and validation.

#![no_main]

use hlb_config::{validate_analysis, AnalysisConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<AnalysisConfig>(data) {
        let _ = validate_analysis(&config);
    }
});
