//! Prior specification.
//!
//! The intercept prior comes from a plausible range for the population base
//! rate of hair loss: the range is mapped to the log-odds scale, the mean is
//! the midpoint and the scale is half the distance from the mean to the
//! upper bound, so the range spans roughly two standard deviations on each
//! side. Coefficients get normal(0, s) priors where `s` is the configured
//! scale, optionally divided by the spread of the predictor column.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hlb_common::{Error, Result};
use hlb_config::{BaseRateRange, NormalPrior, PriorConfig};
use hlb_math::logit;

use super::design::DesignMatrix;

/// Derive the intercept prior from a base-rate range.
pub fn derive_intercept_prior(range: &BaseRateRange) -> Result<NormalPrior> {
    let valid = |p: f64| p.is_finite() && p > 0.0 && p < 1.0;
    if !valid(range.low) || !valid(range.high) {
        return Err(Error::Config(format!(
            "base-rate range [{}, {}] must lie inside (0, 1)",
            range.low, range.high
        )));
    }
    if range.low >= range.high {
        return Err(Error::Config(format!(
            "base-rate range [{}, {}] is empty: low must be below high",
            range.low, range.high
        )));
    }
    let lower = logit(range.low);
    let upper = logit(range.high);
    let mean = (lower + upper) / 2.0;
    Ok(NormalPrior {
        mean,
        scale: (upper - mean) / 2.0,
    })
}

/// Where the intercept prior came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InterceptSource {
    BaseRate { low: f64, high: f64 },
    Override,
}

/// How a coefficient scale was adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScaleRule {
    /// Autoscale disabled.
    Nominal,
    /// Two distinct values: divided by the range.
    Range,
    /// More than two distinct values: divided by the standard deviation.
    StdDev,
    /// Constant column: nominal scale kept.
    Constant,
}

/// Prior of one coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoefficientPrior {
    pub term: String,
    pub mean: f64,
    pub scale: f64,
    pub rule: ScaleRule,
}

/// Priors for every parameter of one model, intercept first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedPriors {
    pub intercept: NormalPrior,
    pub intercept_source: InterceptSource,
    pub coefficient_scale: f64,
    pub autoscale: bool,
    pub coefficients: Vec<CoefficientPrior>,
}

impl ResolvedPriors {
    pub fn coefficient_scales(&self) -> Vec<f64> {
        self.coefficients.iter().map(|c| c.scale).collect()
    }
}

/// The intercept prior in effect: the override when set, else derived.
pub fn intercept_prior(config: &PriorConfig) -> Result<(NormalPrior, InterceptSource)> {
    match &config.intercept_override {
        Some(prior) => {
            if !prior.mean.is_finite() || !(prior.scale > 0.0) {
                return Err(Error::Config(format!(
                    "intercept override normal({}, {}) needs a finite mean and positive scale",
                    prior.mean, prior.scale
                )));
            }
            Ok((*prior, InterceptSource::Override))
        }
        None => Ok((
            derive_intercept_prior(&config.base_rate)?,
            InterceptSource::BaseRate {
                low: config.base_rate.low,
                high: config.base_rate.high,
            },
        )),
    }
}

/// Resolve the full prior specification against a design matrix.
pub fn resolve_priors(config: &PriorConfig, design: &DesignMatrix) -> Result<ResolvedPriors> {
    if !(config.coefficient_scale > 0.0) || !config.coefficient_scale.is_finite() {
        return Err(Error::Config(format!(
            "coefficient scale {} must be positive",
            config.coefficient_scale
        )));
    }
    let (intercept, intercept_source) = intercept_prior(config)?;

    let nominal = config.coefficient_scale;
    let coefficients = design
        .terms()
        .iter()
        .enumerate()
        .map(|(j, term)| {
            let (scale, rule) = if !config.autoscale {
                (nominal, ScaleRule::Nominal)
            } else {
                let spread = design.column_spread(j);
                match spread.distinct {
                    0 | 1 => (nominal, ScaleRule::Constant),
                    2 => (nominal / spread.range, ScaleRule::Range),
                    _ => (nominal / spread.sd, ScaleRule::StdDev),
                }
            };
            CoefficientPrior {
                term: term.name.clone(),
                mean: 0.0,
                scale,
                rule,
            }
        })
        .collect();

    Ok(ResolvedPriors {
        intercept,
        intercept_source,
        coefficient_scale: nominal,
        autoscale: config.autoscale,
        coefficients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{clean, read_csv, CleaningOptions};
    use crate::model::formula::Formula;
    use hlb_config::ModelSpec;

    #[test]
    fn intercept_prior_for_default_range() {
        let prior = derive_intercept_prior(&BaseRateRange { low: 0.16, high: 0.5 }).unwrap();
        assert!((prior.mean - -0.8291).abs() < 1e-3, "mean {}", prior.mean);
        assert!((prior.scale - 0.4145).abs() < 1e-3, "scale {}", prior.scale);
        assert!((prior.mean - -0.830).abs() < 0.01);
        assert!((prior.scale - 0.415).abs() < 0.01);
    }

    #[test]
    fn invalid_ranges_are_config_errors() {
        for (low, high) in [(0.0, 0.5), (0.2, 1.0), (0.5, 0.5), (0.6, 0.4), (f64::NAN, 0.5)] {
            let err = derive_intercept_prior(&BaseRateRange { low, high }).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{low} {high}");
        }
    }

    #[test]
    fn override_replaces_derived_prior() {
        let cfg = PriorConfig {
            intercept_override: Some(NormalPrior { mean: -0.83, scale: 0.4 }),
            ..PriorConfig::default()
        };
        let (prior, source) = intercept_prior(&cfg).unwrap();
        assert_eq!(prior.scale, 0.4);
        assert_eq!(source, InterceptSource::Override);
    }

    #[test]
    fn autoscale_divides_by_range_or_sd() {
        let csv = "Id,Age,Genetics,Smoking,Hair Loss\n1,20,Yes,No,1\n2,30,No,No,0\n3,40,Yes,No,0\n";
        let raw = read_csv(csv.as_bytes(), "t").unwrap();
        let table = clean(&raw, &CleaningOptions::default()).unwrap().table;
        let formula =
            Formula::from_spec(&ModelSpec::new("m", &["Age", "Genetics"])).unwrap();
        let design = DesignMatrix::build(&table, &formula).unwrap();
        let priors = resolve_priors(&PriorConfig::default(), &design).unwrap();

        assert_eq!(priors.coefficients[0].rule, ScaleRule::StdDev);
        assert!((priors.coefficients[0].scale - 2.5 / 10.0).abs() < 1e-12);
        assert_eq!(priors.coefficients[1].rule, ScaleRule::Range);
        assert_eq!(priors.coefficients[1].scale, 2.5);

        let plain = PriorConfig {
            autoscale: false,
            ..PriorConfig::default()
        };
        let priors = resolve_priors(&plain, &design).unwrap();
        assert!(priors.coefficient_scales().iter().all(|s| *s == 2.5));
    }
}
