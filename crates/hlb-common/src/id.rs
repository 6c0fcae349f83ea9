//! Run identity for correlating log events and report payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Run ID for one invocation of the analysis.
///
/// Format: `hlb-YYYYMMDD-HHMMSS-XXXX`
/// Example: `hlb-20260115-143022-a7xq`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let suffix = generate_base32_suffix();
        RunId(format!(
            "hlb-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            suffix
        ))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 24 || !s.starts_with("hlb-") {
            return None;
        }
        let bytes = s.as_bytes();
        if bytes.get(12) != Some(&b'-') || bytes.get(19) != Some(&b'-') {
            return None;
        }
        let date = &s[4..12];
        let time = &s[13..19];
        let suffix = &s[20..24];
        if !date.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !time.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !suffix.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(RunId(s.to_string()))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let mut value = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32);
    value &= 0x000F_FFFF;
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity(4);
    for shift in [15_u32, 10, 5, 0] {
        let idx = ((value >> shift) & 0x1F) as usize;
        out.push(alphabet[idx] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_format() {
        let id = RunId::new();
        assert_eq!(id.0.len(), 24);
        assert!(id.0.starts_with("hlb-"));
        assert!(RunId::parse(&id.0).is_some());
    }

    #[test]
    fn test_run_id_parse_rejects_garbage() {
        assert!(RunId::parse("hlb-2026011-143022-a7xq").is_none());
        assert!(RunId::parse("pt-20260115-143022-a7xq").is_none());
        assert!(RunId::parse("hlb-20260115-143022-A7XQ").is_none());
        assert!(RunId::parse("hlb-20260115-143022-a7xq").is_some());
    }
}
