//! Error types for hair loss Bayes.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Input File Error
//!   Reason: cannot read data/hair_loss.csv: No such file or directory
//!   Fix: Check the path passed to the command and that the file is a comma-separated table.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 23,
//!   "category": "model",
//!   "message": "invalid formula for model3: column Medical.Conditions is not in the cleaned table",
//!   "recoverable": true,
//!   "suggested_action": "fix_config",
//!   "context": { "model": "model3" }
//! }
//! ```
//!
//! Convergence problems and dropped rows are not errors here:
//! they are reported as values alongside a successful result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for hair loss Bayes operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Analysis configuration errors.
    Config,
    /// Input file and table schema errors.
    Data,
    /// Model formula errors.
    Model,
    /// Posterior sampling and numerical errors.
    Inference,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Inference => write!(f, "inference"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested next step for whoever is driving the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Fix or replace the input file.
    FixInput,
    /// Fix the analysis configuration.
    FixConfig,
    /// Validate configuration with `config validate`.
    RunCheck,
    /// Re-run with more iterations or a different seed.
    Resample,
    /// Retry the operation.
    Retry,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::FixConfig => write!(f, "fix_config"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::Resample => write!(f, "resample"),
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for hair loss Bayes.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    // Data errors (20-22)
    #[error("cannot read {path}: {message}")]
    File { path: String, message: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("required column {column} is missing")]
    MissingColumn { column: String },

    // Model errors (23-29)
    #[error("invalid formula for {model}: {message}")]
    Formula { model: String, message: String },

    // Inference errors (30-39)
    #[error("posterior sampling failed: {0}")]
    Sampler(String),

    #[error("numerical instability detected: {0}")]
    NumericalInstability(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a file error with a displayable cause.
    pub fn file(path: impl AsRef<std::path::Path>, cause: impl std::fmt::Display) -> Self {
        Error::File {
            path: path.as_ref().display().to_string(),
            message: cause.to_string(),
        }
    }

    /// Shorthand for a formula error.
    pub fn formula(model: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Formula {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-22: Data errors
    /// - 23-29: Model errors
    /// - 30-39: Inference errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig { .. } => 11,
            Error::File { .. } => 20,
            Error::Schema(_) => 21,
            Error::MissingColumn { .. } => 22,
            Error::Formula { .. } => 23,
            Error::Sampler(_) => 30,
            Error::NumericalInstability(_) => 31,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => ErrorCategory::Config,
            Error::File { .. } | Error::Schema(_) | Error::MissingColumn { .. } => {
                ErrorCategory::Data
            }
            Error::Formula { .. } => ErrorCategory::Model,
            Error::Sampler(_) | Error::NumericalInstability(_) => ErrorCategory::Inference,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether re-running with changed inputs can succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::NumericalInstability(_))
    }

    /// Returns the suggested next step.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) => SuggestedAction::RunCheck,
            Error::InvalidConfig { .. } => SuggestedAction::FixConfig,
            Error::File { .. } | Error::Schema(_) | Error::MissingColumn { .. } => {
                SuggestedAction::FixInput
            }
            Error::Formula { .. } => SuggestedAction::FixConfig,
            Error::Sampler(_) => SuggestedAction::Resample,
            Error::NumericalInstability(_) => SuggestedAction::ManualIntervention,
            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::FixConfig,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'hlb-core config validate' to check the analysis configuration."
            }
            Error::InvalidConfig { .. } => {
                "Correct the named field in analysis.json, or remove it to use the default."
            }
            Error::File { .. } => {
                "Check the path passed to the command and that the file is a comma-separated table."
            }
            Error::Schema(_) => {
                "Check the column values against the documented survey schema (Yes/No factors, numeric Age, 0/1 Hair Loss)."
            }
            Error::MissingColumn { .. } => {
                "The survey file must contain an Id column and a Hair Loss column."
            }
            Error::Formula { .. } => {
                "Only use predictors whose columns are present in the input file."
            }
            Error::Sampler(_) => {
                "Re-run with more warmup iterations or a different seed."
            }
            Error::NumericalInstability(_) => {
                "Internal numerical issue. Report the input and configuration that triggered it."
            }
            Error::Io(_) => "Check disk space and permissions, then retry.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq . <file>'.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig { .. } => "Invalid Configuration Value",
            Error::File { .. } => "Input File Error",
            Error::Schema(_) => "Schema Error",
            Error::MissingColumn { .. } => "Missing Column",
            Error::Formula { .. } => "Formula Error",
            Error::Sampler(_) => "Sampler Error",
            Error::NumericalInstability(_) => "Numerical Instability",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }

    /// Format the error for a terminal: headline, reason, and fix.
    pub fn to_human(&self) -> String {
        format!(
            "✗ {}\n  Reason: {}\n  Fix: {}",
            self.headline(),
            self,
            self.remediation()
        )
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested next step.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., file path, model name).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = BTreeMap::new();

        match err {
            Error::File { path, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::MissingColumn { column } => {
                context.insert("column".to_string(), serde_json::json!(column));
            }
            Error::Formula { model, .. } => {
                context.insert("model".to_string(), serde_json::json!(model));
            }
            Error::InvalidConfig { field, .. } => {
                context.insert("field".to_string(), serde_json::json!(field));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped_by_category() {
        let cases: Vec<(Error, ErrorCategory)> = vec![
            (Error::Config("x".into()), ErrorCategory::Config),
            (Error::file("a.csv", "gone"), ErrorCategory::Data),
            (Error::Schema("bad".into()), ErrorCategory::Data),
            (Error::formula("model1", "no column"), ErrorCategory::Model),
            (Error::Sampler("diverged".into()), ErrorCategory::Inference),
        ];
        for (err, category) in cases {
            assert_eq!(err.category(), category, "{err}");
            let code = err.code();
            let range = match category {
                ErrorCategory::Config => 10..20,
                ErrorCategory::Data => 20..23,
                ErrorCategory::Model => 23..30,
                ErrorCategory::Inference => 30..40,
                ErrorCategory::Io => 60..70,
            };
            assert!(range.contains(&code), "{err} has code {code}");
        }
    }

    #[test]
    fn structured_error_carries_context() {
        let err = Error::formula("model4", "column Weight.Loss is not in the table");
        let structured = StructuredError::from(&err);
        assert_eq!(structured.code, 23);
        assert_eq!(structured.suggested_action, SuggestedAction::FixConfig);
        assert_eq!(structured.context["model"], serde_json::json!("model4"));
        let json = structured.to_json();
        assert!(json.contains("\"category\":\"model\""));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert_eq!(err.code(), 60);
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn human_format_has_headline_and_fix() {
        let err = Error::MissingColumn {
            column: "Hair.Loss".into(),
        };
        let text = err.to_human();
        assert!(text.starts_with("✗ Missing Column"));
        assert!(text.contains("Fix:"));
    }
}
