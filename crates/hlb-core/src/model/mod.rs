//! Bayesian logistic regression of Hair.Loss on survey risk factors.
//!
//! - [`formula`]: named predictor sets validated against the cleaned table
//! - [`design`]: treatment-coded design matrix
//! - [`prior`]: intercept prior from a base-rate range, autoscaled
//!   coefficient priors
//! - [`sampler`]: the [`PosteriorSampler`] boundary and draw containers
//! - [`hmc`]: the bundled Hamiltonian Monte Carlo sampler
//! - [`fit`]: fitting and convergence checks

pub mod design;
pub mod fit;
pub mod formula;
pub mod hmc;
pub mod prior;
pub mod sampler;

pub use design::{DesignMatrix, Term};
pub use fit::{
    check_convergence, convergence, fit_design, fit_model, fit_model_with, ConvergenceThresholds,
    ConvergenceWarning, FittedModel, TermConvergence,
};
pub use formula::{Formula, PredictorSet};
pub use hmc::HmcSampler;
pub use prior::{
    derive_intercept_prior, intercept_prior, resolve_priors, CoefficientPrior, InterceptSource,
    ResolvedPriors, ScaleRule,
};
pub use sampler::{
    ChainDraws, LogitProblem, PosteriorDraws, PosteriorSampler, SamplerConfig, INTERCEPT,
};
