//! Posterior sampling boundary.
//!
//! A [`PosteriorSampler`] draws from the posterior of a [`LogitProblem`]:
//! Bernoulli outcomes with a logit link, a normal prior on the intercept and
//! independent normal priors on the coefficients. Predictors are centered,
//! so parameter 0 is the intercept at the predictor means.

use std::io::Write;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hlb_common::{Error, Result};
use hlb_config::{NormalPrior, SamplerSettings};
use hlb_math::{bernoulli_logit_lpmf, normal, sigmoid};

use super::design::DesignMatrix;
use super::prior::ResolvedPriors;

/// Log posterior of a centered logistic regression.
#[derive(Debug, Clone)]
pub struct LogitProblem {
    /// Row-major centered predictors, `n_rows * n_terms`.
    x: Vec<f64>,
    y: Vec<bool>,
    n_terms: usize,
    means: Vec<f64>,
    intercept: NormalPrior,
    scales: Vec<f64>,
    param_names: Vec<String>,
}

impl LogitProblem {
    pub fn new(design: &DesignMatrix, priors: &ResolvedPriors) -> Result<Self> {
        let p = design.n_terms();
        if priors.coefficients.len() != p {
            return Err(Error::Sampler(format!(
                "{} coefficient priors for {} design terms",
                priors.coefficients.len(),
                p
            )));
        }
        if design.n_rows() == 0 {
            return Err(Error::Sampler("no rows to fit".to_string()));
        }
        let means = design.column_means();
        let mut x = Vec::with_capacity(design.n_rows() * p);
        for i in 0..design.n_rows() {
            x.extend(design.row(i).iter().zip(&means).map(|(v, m)| v - m));
        }
        let mut param_names = vec![INTERCEPT.to_string()];
        param_names.extend(design.term_names());
        Ok(LogitProblem {
            x,
            y: design.outcomes().to_vec(),
            n_terms: p,
            means,
            intercept: priors.intercept,
            scales: priors.coefficient_scales(),
            param_names,
        })
    }

    /// Number of parameters: intercept plus one per term.
    pub fn dim(&self) -> usize {
        self.n_terms + 1
    }

    pub fn n_rows(&self) -> usize {
        self.y.len()
    }

    pub fn column_means(&self) -> &[f64] {
        &self.means
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    fn eta(&self, i: usize, theta: &[f64]) -> f64 {
        let row = &self.x[i * self.n_terms..(i + 1) * self.n_terms];
        theta[0] + row.iter().zip(&theta[1..]).map(|(x, b)| x * b).sum::<f64>()
    }

    fn log_prior(&self, theta: &[f64]) -> f64 {
        normal::log_pdf(theta[0], self.intercept.mean, self.intercept.scale)
            + theta[1..]
                .iter()
                .zip(&self.scales)
                .map(|(&b, &s)| normal::log_pdf(b, 0.0, s))
                .sum::<f64>()
    }

    /// Unnormalized log posterior.
    pub fn log_density(&self, theta: &[f64]) -> f64 {
        let mut lp = self.log_prior(theta);
        for i in 0..self.n_rows() {
            lp += bernoulli_logit_lpmf(self.y[i], self.eta(i, theta));
        }
        lp
    }

    /// Unnormalized log posterior; writes the gradient into `grad`.
    pub fn log_density_and_grad(&self, theta: &[f64], grad: &mut [f64]) -> f64 {
        let mut lp = self.log_prior(theta);
        grad[0] = -(theta[0] - self.intercept.mean) / (self.intercept.scale * self.intercept.scale);
        for j in 0..self.n_terms {
            let s = self.scales[j];
            grad[j + 1] = -theta[j + 1] / (s * s);
        }
        for i in 0..self.n_rows() {
            let eta = self.eta(i, theta);
            lp += bernoulli_logit_lpmf(self.y[i], eta);
            let resid = if self.y[i] { 1.0 } else { 0.0 } - sigmoid(eta);
            grad[0] += resid;
            let row = &self.x[i * self.n_terms..(i + 1) * self.n_terms];
            for (g, x) in grad[1..].iter_mut().zip(row) {
                *g += resid * x;
            }
        }
        lp
    }
}

/// Name of the intercept parameter.
pub const INTERCEPT: &str = "(Intercept)";

/// Sampler run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SamplerConfig {
    pub chains: usize,
    pub warmup: usize,
    /// Retained draws per chain.
    pub draws: usize,
    pub seed: u64,
    pub target_accept: f64,
    pub max_leapfrog_steps: usize,
}

impl SamplerConfig {
    pub fn from_settings(settings: &SamplerSettings) -> Result<Self> {
        let config = SamplerConfig {
            chains: settings.chains,
            warmup: settings.warmup_iterations(),
            draws: settings.draws_per_chain(),
            seed: settings.seed,
            target_accept: settings.target_accept,
            max_leapfrog_steps: settings.max_leapfrog_steps,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chains == 0 {
            return Err(Error::Sampler("at least one chain is required".to_string()));
        }
        if self.draws == 0 {
            return Err(Error::Sampler(
                "no draws left after warmup; increase iterations".to_string(),
            ));
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return Err(Error::Sampler(format!(
                "target acceptance {} must be in (0, 1)",
                self.target_accept
            )));
        }
        if self.max_leapfrog_steps == 0 {
            return Err(Error::Sampler("max_leapfrog_steps must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Retained draws and adaptation results of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDraws {
    /// One parameter vector per retained iteration.
    pub draws: Vec<Vec<f64>>,
    pub divergences: usize,
    pub step_size: f64,
    /// Mean acceptance probability over retained iterations.
    pub accept_rate: f64,
    /// Mean leapfrog steps per retained iteration.
    pub mean_leapfrog_steps: f64,
}

/// Posterior draws grouped by chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorDraws {
    pub param_names: Vec<String>,
    pub chains: Vec<ChainDraws>,
}

impl PosteriorDraws {
    pub fn n_params(&self) -> usize {
        self.param_names.len()
    }

    pub fn n_chains(&self) -> usize {
        self.chains.len()
    }

    /// Total retained draws over all chains.
    pub fn n_draws(&self) -> usize {
        self.chains.iter().map(|c| c.draws.len()).sum()
    }

    pub fn divergences(&self) -> usize {
        self.chains.iter().map(|c| c.divergences).sum()
    }

    /// Draws of parameter `j`, one vector per chain.
    pub fn param_chains(&self, j: usize) -> Vec<Vec<f64>> {
        self.chains
            .iter()
            .map(|c| c.draws.iter().map(|d| d[j]).collect())
            .collect()
    }

    /// Draws of parameter `j`, chains concatenated.
    pub fn param_all(&self, j: usize) -> Vec<f64> {
        self.iter().map(|d| d[j]).collect()
    }

    /// Every draw, chain by chain.
    pub fn iter(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.chains
            .iter()
            .flat_map(|c| c.draws.iter().map(Vec::as_slice))
    }

    /// Transform every draw.
    pub fn map_draws(&self, f: impl Fn(&[f64]) -> Vec<f64>) -> PosteriorDraws {
        PosteriorDraws {
            param_names: self.param_names.clone(),
            chains: self
                .chains
                .iter()
                .map(|c| ChainDraws {
                    draws: c.draws.iter().map(|d| f(d)).collect(),
                    ..c.clone()
                })
                .collect(),
        }
    }

    /// Long-format CSV: `chain,iteration,<params...>`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let csv_err = |e: csv::Error| Error::Io(std::io::Error::other(e.to_string()));
        let mut header = vec!["chain".to_string(), "iteration".to_string()];
        header.extend(self.param_names.iter().cloned());
        wtr.write_record(&header).map_err(csv_err)?;
        for (c, chain) in self.chains.iter().enumerate() {
            for (t, draw) in chain.draws.iter().enumerate() {
                let mut record = vec![(c + 1).to_string(), (t + 1).to_string()];
                record.extend(draw.iter().map(|v| v.to_string()));
                wtr.write_record(&record).map_err(csv_err)?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}

/// A posterior sampler for logistic regression problems.
pub trait PosteriorSampler: Send + Sync {
    /// Short identifier recorded in reports.
    fn name(&self) -> &'static str;

    /// Draw `config.draws` retained draws per chain for each of
    /// `config.chains` chains. Must be deterministic for a given seed.
    fn sample(&self, problem: &LogitProblem, config: &SamplerConfig) -> Result<PosteriorDraws>;
}
