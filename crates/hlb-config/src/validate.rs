//! Configuration validation errors and semantic validation.

use std::collections::HashSet;
use thiserror::Error;

use crate::analysis::{AnalysisConfig, SamplerSettings};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::SemanticError(_) => 63,
            ValidationError::MissingField(_) => 64,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }

    /// Name of the offending field, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::InvalidValue { field, .. } => Some(field),
            ValidationError::MissingField(field) => Some(field),
            _ => None,
        }
    }
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Validate an analysis configuration semantically.
pub fn validate_analysis(cfg: &AnalysisConfig) -> ValidationResult<()> {
    if cfg.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: cfg.schema_version.clone(),
        });
    }

    check_open_unit("outcome_threshold", cfg.outcome_threshold)?;
    check_open_unit("credible_level", cfg.credible_level)?;

    if cfg.cleaning.sentinel.trim().is_empty() {
        return Err(invalid("cleaning.sentinel", "Must not be empty"));
    }
    for (column, levels) in &cfg.cleaning.level_orders {
        let field = format!("cleaning.level_orders.{}", column);
        if levels.is_empty() {
            return Err(invalid(field, "Level order must list at least one level"));
        }
        let mut seen = HashSet::new();
        for level in levels {
            if !seen.insert(level.trim().to_lowercase()) {
                return Err(invalid(field, format!("Level '{}' listed twice", level)));
            }
        }
    }

    let base = &cfg.priors.base_rate;
    check_open_unit("priors.base_rate.low", base.low)?;
    check_open_unit("priors.base_rate.high", base.high)?;
    if base.low >= base.high {
        return Err(invalid(
            "priors.base_rate",
            format!("low ({}) must be below high ({})", base.low, base.high),
        ));
    }
    if let Some(prior) = &cfg.priors.intercept_override {
        if !prior.mean.is_finite() {
            return Err(invalid("priors.intercept_override.mean", "Must be finite"));
        }
        check_positive("priors.intercept_override.scale", prior.scale)?;
    }
    check_positive("priors.coefficient_scale", cfg.priors.coefficient_scale)?;

    validate_sampler("sampler", &cfg.sampler)?;

    let diag = &cfg.diagnostics;
    if diag.rhat_threshold <= 1.0 || !diag.rhat_threshold.is_finite() {
        return Err(invalid(
            "diagnostics.rhat_threshold",
            format!("Must be above 1.0, got {}", diag.rhat_threshold),
        ));
    }
    if diag.min_ess_per_chain < 0.0 || !diag.min_ess_per_chain.is_finite() {
        return Err(invalid("diagnostics.min_ess_per_chain", "Must be >= 0"));
    }
    if diag.trace_points < 2 {
        return Err(invalid("diagnostics.trace_points", "Must be at least 2"));
    }
    if diag.density_points < 2 {
        return Err(invalid("diagnostics.density_points", "Must be at least 2"));
    }

    if cfg.ppc.n_reps == 0 {
        return Err(invalid("ppc.n_reps", "Must be at least 1"));
    }
    check_open_unit("ppc.level", cfg.ppc.level)?;

    if cfg.cross_validation.folds < 2 {
        return Err(invalid(
            "cross_validation.folds",
            format!("Must be at least 2, got {}", cfg.cross_validation.folds),
        ));
    }
    if let Some(sampler) = &cfg.cross_validation.sampler {
        validate_sampler("cross_validation.sampler", sampler)?;
    }

    if cfg.models.is_empty() {
        return Err(ValidationError::MissingField("models".to_string()));
    }
    let mut names = HashSet::new();
    for (i, model) in cfg.models.iter().enumerate() {
        let field = format!("models[{}]", i);
        if model.name.trim().is_empty() {
            return Err(invalid(format!("{}.name", field), "Must not be empty"));
        }
        if !names.insert(model.name.to_lowercase()) {
            return Err(ValidationError::SemanticError(format!(
                "Model name '{}' is used more than once",
                model.name
            )));
        }
        if model.predictors.is_empty() {
            return Err(invalid(
                format!("{}.predictors", field),
                format!("Model '{}' lists no predictors", model.name),
            ));
        }
        let mut seen = HashSet::new();
        for p in &model.predictors {
            if p.trim().is_empty() {
                return Err(invalid(
                    format!("{}.predictors", field),
                    "Predictor names must not be empty",
                ));
            }
            if !seen.insert(p.trim().to_lowercase()) {
                return Err(invalid(
                    format!("{}.predictors", field),
                    format!("Predictor '{}' listed twice in '{}'", p, model.name),
                ));
            }
        }
    }

    Ok(())
}

fn validate_sampler(prefix: &str, s: &SamplerSettings) -> ValidationResult<()> {
    if s.chains == 0 {
        return Err(invalid(format!("{}.chains", prefix), "Must be at least 1"));
    }
    let warmup = s.warmup_iterations();
    if warmup >= s.iterations {
        return Err(invalid(
            format!("{}.warmup", prefix),
            format!(
                "Warmup ({}) must be below iterations ({})",
                warmup, s.iterations
            ),
        ));
    }
    check_open_unit(&format!("{}.target_accept", prefix), s.target_accept)?;
    if s.max_leapfrog_steps == 0 {
        return Err(invalid(
            format!("{}.max_leapfrog_steps", prefix),
            "Must be at least 1",
        ));
    }
    Ok(())
}

fn check_open_unit(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_nan() || value <= 0.0 || value >= 1.0 {
        return Err(invalid(field, format!("Must be in (0, 1), got {}", value)));
    }
    Ok(())
}

fn check_positive(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(field, format!("Must be > 0, got {}", value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BaseRateRange, ModelSpec};

    #[test]
    fn default_config_is_valid() {
        validate_analysis(&AnalysisConfig::default()).unwrap();
    }

    #[test]
    fn rejects_inverted_base_rate() {
        let mut cfg = AnalysisConfig::default();
        cfg.priors.base_rate = BaseRateRange {
            low: 0.5,
            high: 0.16,
        };
        let err = validate_analysis(&cfg).unwrap_err();
        assert_eq!(err.field(), Some("priors.base_rate"));
        assert_eq!(err.code(), 65);
    }

    #[test]
    fn rejects_warmup_not_below_iterations() {
        let mut cfg = AnalysisConfig::default();
        cfg.sampler.warmup = Some(2000);
        let err = validate_analysis(&cfg).unwrap_err();
        assert_eq!(err.field(), Some("sampler.warmup"));
    }

    #[test]
    fn rejects_duplicate_model_names() {
        let mut cfg = AnalysisConfig::default();
        cfg.models.push(ModelSpec::new("Model1", &["Age"]));
        assert!(matches!(
            validate_analysis(&cfg),
            Err(ValidationError::SemanticError(_))
        ));
    }

    #[test]
    fn rejects_single_fold() {
        let mut cfg = AnalysisConfig::default();
        cfg.cross_validation.folds = 1;
        let err = validate_analysis(&cfg).unwrap_err();
        assert_eq!(err.field(), Some("cross_validation.folds"));
    }

    #[test]
    fn rejects_version_mismatch() {
        let cfg = AnalysisConfig {
            schema_version: "0.9.0".into(),
            ..AnalysisConfig::default()
        };
        assert_eq!(validate_analysis(&cfg).unwrap_err().code(), 66);
    }
}
