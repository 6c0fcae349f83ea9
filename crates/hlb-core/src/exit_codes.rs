//! Exit codes for the hlb-core CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-1: Completed runs (1 = finished, but a sampler diagnostic needs review)
//! - 10-19: User/input errors (recoverable by fixing arguments, data or config)
//! - 20-29: Internal errors (bugs, should be reported)

use hlb_common::{Error, ErrorCategory};

/// Exit codes for hlb-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Completed runs (0-1)
    // ========================================================================
    /// Success: every fit converged.
    Clean = 0,

    /// Completed, but at least one fit raised a convergence warning.
    ConvergenceWarnings = 1,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Input file unreadable or malformed
    FileError = 11,

    /// Input table does not match the survey schema
    SchemaError = 12,

    /// Model formula names a column that is not in the table
    FormulaError = 13,

    /// Analysis configuration invalid
    ConfigError = 14,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if the run completed (codes 0-1).
    pub fn is_success(self) -> bool {
        (self as i32) < 10
    }

    /// Check if this exit code is a user/input error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ConvergenceWarnings => "OK_WARNINGS",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::FileError => "ERR_FILE",
            ExitCode::SchemaError => "ERR_SCHEMA",
            ExitCode::FormulaError => "ERR_FORMULA",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Map a library error to its exit code.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::File { .. } => ExitCode::FileError,
            Error::Schema(_) | Error::MissingColumn { .. } => ExitCode::SchemaError,
            Error::Formula { .. } => ExitCode::FormulaError,
            Error::Io(_) => ExitCode::IoError,
            _ => match err.category() {
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Io => ExitCode::IoError,
                _ => ExitCode::InternalError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
