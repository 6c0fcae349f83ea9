//! Posterior coefficient summaries.

use serde::Serialize;

use hlb_common::{Error, Result};
use hlb_math::{equal_tailed_interval, mad_sd, mean, median, std_dev, Interval};

use crate::data::Column;
use crate::model::FittedModel;

/// Posterior summary of one coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientSummary {
    pub term: String,
    /// Source column; None for the intercept.
    pub column: Option<Column>,
    pub mean: f64,
    pub median: f64,
    pub sd: f64,
    pub mad_sd: f64,
    /// Equal-tailed credible interval on the log-odds scale.
    pub interval: Interval,
    /// exp(median).
    pub odds_ratio: f64,
    pub odds_ratio_interval: Interval,
    /// The credible interval excludes zero.
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub model: String,
    pub formula: String,
    pub level: f64,
    pub n_draws: usize,
    pub coefficients: Vec<CoefficientSummary>,
}

impl ModelSummary {
    /// Predictor columns with at least one significant term, in formula
    /// order. The intercept is never listed.
    pub fn significant_predictors(&self) -> Vec<Column> {
        let mut out: Vec<Column> = Vec::new();
        for c in &self.coefficients {
            if let (true, Some(column)) = (c.significant, c.column) {
                if !out.contains(&column) {
                    out.push(column);
                }
            }
        }
        out
    }

    pub fn coefficient(&self, term: &str) -> Option<&CoefficientSummary> {
        self.coefficients.iter().find(|c| c.term == term)
    }
}

/// Summarize every coefficient at credible level `level`.
pub fn summarize(fit: &FittedModel, level: f64) -> Result<ModelSummary> {
    if !(level > 0.0 && level < 1.0) {
        return Err(Error::Config(format!("credible level {} must be in (0, 1)", level)));
    }
    let columns: Vec<Option<Column>> = std::iter::once(None)
        .chain(fit.design.terms().iter().map(|t| Some(t.column)))
        .collect();

    let mut coefficients = Vec::with_capacity(fit.n_coefficients());
    for (j, term) in fit.terms().iter().enumerate() {
        let draws = fit.coefficient_draws(j);
        let interval = equal_tailed_interval(&draws, level).ok_or_else(|| {
            Error::NumericalInstability(format!("{}: no finite draws for {}", fit.name, term))
        })?;
        let med = median(&draws);
        coefficients.push(CoefficientSummary {
            term: term.clone(),
            column: columns.get(j).copied().flatten(),
            mean: mean(&draws),
            median: med,
            sd: std_dev(&draws),
            mad_sd: mad_sd(&draws),
            interval,
            odds_ratio: med.exp(),
            odds_ratio_interval: interval.map(f64::exp),
            significant: !interval.contains(0.0),
        });
    }

    Ok(ModelSummary {
        model: fit.name.clone(),
        formula: fit.formula.to_string(),
        level,
        n_draws: fit.draws.n_draws(),
        coefficients,
    })
}
