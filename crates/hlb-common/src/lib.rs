//! Hair loss Bayes common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Run identity for correlating logs and reports
//! - Schema versioning for JSON payloads
//! - Common error types with stable codes
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;

pub use error::{Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use id::RunId;
pub use output::OutputFormat;

/// Schema version of the JSON payloads written to stdout.
pub const SCHEMA_VERSION: &str = "1.0.0";
