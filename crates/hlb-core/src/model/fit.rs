//! Model fitting: formula, design, priors, sampler, convergence checks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hlb_common::{Error, Result};
use hlb_config::{DiagnosticsConfig, ModelSpec, PriorConfig};
use hlb_math::{mcmc, sigmoid};

use super::design::DesignMatrix;
use super::formula::Formula;
use super::prior::{resolve_priors, ResolvedPriors};
use super::sampler::{LogitProblem, PosteriorDraws, PosteriorSampler, SamplerConfig};
use crate::data::SurveyTable;
use crate::logging::event_names;

/// Limits beyond which a fit is flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConvergenceThresholds {
    pub rhat: f64,
    pub min_ess_per_chain: f64,
}

impl Default for ConvergenceThresholds {
    fn default() -> Self {
        ConvergenceThresholds {
            rhat: 1.05,
            min_ess_per_chain: 100.0,
        }
    }
}

impl From<&DiagnosticsConfig> for ConvergenceThresholds {
    fn from(cfg: &DiagnosticsConfig) -> Self {
        ConvergenceThresholds {
            rhat: cfg.rhat_threshold,
            min_ess_per_chain: cfg.min_ess_per_chain,
        }
    }
}

/// A sign that the chains may not represent the posterior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConvergenceWarning {
    HighRhat { term: String, rhat: f64, threshold: f64 },
    LowEss { term: String, ess: f64, minimum: f64 },
    Divergences { count: usize, draws: usize },
}

impl std::fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvergenceWarning::HighRhat {
                term,
                rhat,
                threshold,
            } => write!(f, "{}: split R-hat {:.3} above {}", term, rhat, threshold),
            ConvergenceWarning::LowEss { term, ess, minimum } => {
                write!(f, "{}: bulk ESS {:.0} below {:.0}", term, ess, minimum)
            }
            ConvergenceWarning::Divergences { count, draws } => {
                write!(f, "{} of {} transitions diverged", count, draws)
            }
        }
    }
}

/// Split R-hat and bulk ESS of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TermConvergence {
    pub term: String,
    pub rhat: f64,
    pub ess: f64,
}

/// R-hat and ESS of every parameter.
pub fn convergence(draws: &PosteriorDraws) -> Vec<TermConvergence> {
    draws
        .param_names
        .iter()
        .enumerate()
        .map(|(j, term)| {
            let chains = draws.param_chains(j);
            TermConvergence {
                term: term.clone(),
                rhat: mcmc::split_rhat(&chains),
                ess: mcmc::effective_sample_size(&chains),
            }
        })
        .collect()
}

/// Warnings for parameters beyond the thresholds and for divergences.
pub fn check_convergence(
    terms: &[TermConvergence],
    draws: &PosteriorDraws,
    thresholds: &ConvergenceThresholds,
) -> Vec<ConvergenceWarning> {
    let min_ess = thresholds.min_ess_per_chain * draws.n_chains() as f64;
    let mut warnings = Vec::new();
    for t in terms {
        if t.rhat > thresholds.rhat || t.rhat.is_infinite() {
            warnings.push(ConvergenceWarning::HighRhat {
                term: t.term.clone(),
                rhat: t.rhat,
                threshold: thresholds.rhat,
            });
        }
        if t.ess < min_ess {
            warnings.push(ConvergenceWarning::LowEss {
                term: t.term.clone(),
                ess: t.ess,
                minimum: min_ess,
            });
        }
    }
    let divergences = draws.divergences();
    if divergences > 0 {
        warnings.push(ConvergenceWarning::Divergences {
            count: divergences,
            draws: draws.n_draws(),
        });
    }
    warnings
}

/// A fitted Bayesian logistic regression. Immutable once built.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub name: String,
    pub formula: Formula,
    pub design: DesignMatrix,
    pub priors: ResolvedPriors,
    /// Name of the sampler that produced the draws.
    pub sampler: String,
    pub config: SamplerConfig,
    /// Draws on the uncentered scale; parameter 0 is the intercept.
    pub draws: PosteriorDraws,
    pub convergence: Vec<TermConvergence>,
    pub warnings: Vec<ConvergenceWarning>,
}

impl FittedModel {
    /// Parameter names, intercept first.
    pub fn terms(&self) -> &[String] {
        &self.draws.param_names
    }

    pub fn n_coefficients(&self) -> usize {
        self.draws.n_params()
    }

    pub fn coefficient_draws(&self, j: usize) -> Vec<f64> {
        self.draws.param_all(j)
    }

    pub fn is_converged(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Posterior mean probability of Yes for every row of `design`.
    pub fn predict_proba(&self, design: &DesignMatrix) -> Result<Vec<f64>> {
        if design.term_names() != self.design.term_names() {
            return Err(Error::formula(
                &self.name,
                "prediction design does not match the fitted terms",
            ));
        }
        let n_draws = self.draws.n_draws();
        if n_draws == 0 {
            return Err(Error::Sampler(format!("{} has no posterior draws", self.name)));
        }
        let probs = (0..design.n_rows())
            .map(|i| {
                let row = design.row(i);
                let total: f64 = self
                    .draws
                    .iter()
                    .map(|theta| {
                        let eta = theta[0]
                            + row.iter().zip(&theta[1..]).map(|(x, b)| x * b).sum::<f64>();
                        sigmoid(eta)
                    })
                    .sum();
                total / n_draws as f64
            })
            .collect();
        Ok(probs)
    }

    /// Posterior mean probabilities for the rows the model was fit on.
    pub fn fitted_proba(&self) -> Result<Vec<f64>> {
        self.predict_proba(&self.design)
    }
}

/// Fit one model with default convergence thresholds.
pub fn fit_model(
    table: &SurveyTable,
    spec: &ModelSpec,
    priors: &PriorConfig,
    sampler: &dyn PosteriorSampler,
    config: &SamplerConfig,
) -> Result<FittedModel> {
    fit_model_with(
        table,
        spec,
        priors,
        sampler,
        config,
        &ConvergenceThresholds::default(),
    )
}

/// Fit one model: validate the formula, build the design, resolve priors
/// and sample.
pub fn fit_model_with(
    table: &SurveyTable,
    spec: &ModelSpec,
    priors: &PriorConfig,
    sampler: &dyn PosteriorSampler,
    config: &SamplerConfig,
    thresholds: &ConvergenceThresholds,
) -> Result<FittedModel> {
    let formula = Formula::from_spec(spec)?;
    let design = DesignMatrix::build(table, &formula)?;
    fit_design(formula, design, priors, sampler, config, thresholds)
}

/// Fit a prepared design. Priors are autoscaled against this design.
pub fn fit_design(
    formula: Formula,
    design: DesignMatrix,
    priors: &PriorConfig,
    sampler: &dyn PosteriorSampler,
    config: &SamplerConfig,
    thresholds: &ConvergenceThresholds,
) -> Result<FittedModel> {
    let resolved = resolve_priors(priors, &design)?;
    let problem = LogitProblem::new(&design, &resolved)?;

    tracing::debug!(
        target: event_names::FIT_STARTED,
        model = %formula.model,
        terms = design.n_terms(),
        rows = design.n_rows(),
        sampler = sampler.name(),
        "sampling"
    );
    let centered = sampler.sample(&problem, config)?;
    if centered.param_names.len() != problem.dim() {
        return Err(Error::Sampler(format!(
            "{} returned {} parameters, expected {}",
            sampler.name(),
            centered.param_names.len(),
            problem.dim()
        )));
    }

    let means = problem.column_means().to_vec();
    let draws = centered.map_draws(|theta| {
        let mut out = theta.to_vec();
        out[0] -= theta[1..].iter().zip(&means).map(|(b, m)| b * m).sum::<f64>();
        out
    });
    if draws.iter().any(|d| d.iter().any(|v| !v.is_finite())) {
        return Err(Error::NumericalInstability(format!(
            "{}: non-finite posterior draws",
            formula.model
        )));
    }

    let convergence = convergence(&draws);
    let warnings = check_convergence(&convergence, &draws, thresholds);
    for w in &warnings {
        tracing::warn!(
            target: event_names::FIT_CONVERGENCE_WARNING,
            model = %formula.model,
            warning = %w,
            "convergence warning"
        );
    }

    Ok(FittedModel {
        name: formula.model.clone(),
        formula,
        design,
        priors: resolved,
        sampler: sampler.name().to_string(),
        config: config.clone(),
        draws,
        convergence,
        warnings,
    })
}
