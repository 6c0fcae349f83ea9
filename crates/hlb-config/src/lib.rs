//! Hair loss Bayes analysis configuration.
//!
//! This crate provides:
//! - Typed Rust structs for analysis.json
//! - The four model presets of the survey analysis
//! - Semantic validation

pub mod analysis;
pub mod preset;
pub mod validate;

pub use analysis::{
    AnalysisConfig, BaseRateRange, CleaningConfig, CrossValidationConfig, DiagnosticsConfig,
    DuplicatePolicy, ModelSpec, NormalPrior, PpcSettings, PriorConfig, SamplerSettings,
};
pub use preset::{get_preset, list_presets, PresetName};
pub use validate::{validate_analysis, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
