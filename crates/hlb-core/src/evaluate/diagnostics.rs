//! MCMC diagnostics: trace, density overlay, autocorrelation, R-hat, ESS.

use serde::Serialize;

use hlb_config::DiagnosticsConfig;
use hlb_math::{kde, mcmc};

use crate::model::FittedModel;

/// Diagnostics of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermDiagnostics {
    pub term: String,
    pub rhat: f64,
    pub ess: f64,
    /// Every `trace_stride`-th draw of each chain.
    pub trace: Vec<Vec<f64>>,
    pub trace_stride: usize,
    /// Grid shared by the per-chain densities.
    pub density_grid: Vec<f64>,
    /// Gaussian KDE per chain over `density_grid`.
    pub density: Vec<Vec<f64>>,
    /// Autocorrelation per chain for lags 0..=max_lag.
    pub acf: Vec<Vec<f64>>,
}

/// Diagnostics of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub model: String,
    pub chains: usize,
    pub draws_per_chain: usize,
    pub divergences: usize,
    pub step_sizes: Vec<f64>,
    pub accept_rates: Vec<f64>,
    pub terms: Vec<TermDiagnostics>,
}

impl Diagnostics {
    /// Largest split R-hat over all parameters, ignoring NaN.
    pub fn max_rhat(&self) -> f64 {
        self.terms
            .iter()
            .map(|t| t.rhat)
            .filter(|r| !r.is_nan())
            .fold(f64::NAN, f64::max)
    }

    /// Smallest bulk ESS over all parameters, ignoring NaN.
    pub fn min_ess(&self) -> f64 {
        self.terms
            .iter()
            .map(|t| t.ess)
            .filter(|e| !e.is_nan())
            .fold(f64::NAN, f64::min)
    }
}

/// Keep at most `points` evenly strided values; returns them and the stride.
pub fn thin(series: &[f64], points: usize) -> (Vec<f64>, usize) {
    if series.is_empty() || points == 0 {
        return (Vec::new(), 1);
    }
    let stride = series.len().div_ceil(points).max(1);
    (series.iter().step_by(stride).copied().collect(), stride)
}

/// Evaluation grid covering every chain, padded by three bandwidths.
fn shared_grid(pooled: &[f64], bandwidth: f64, points: usize) -> Vec<f64> {
    let lo = pooled.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = pooled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return Vec::new();
    }
    kde::linspace(lo - 3.0 * bandwidth, hi + 3.0 * bandwidth, points)
}

pub fn diagnose(fit: &FittedModel, config: &DiagnosticsConfig) -> Diagnostics {
    let draws = &fit.draws;
    let terms = draws
        .param_names
        .iter()
        .enumerate()
        .map(|(j, term)| {
            let chains = draws.param_chains(j);
            let pooled: Vec<f64> = chains.iter().flatten().copied().collect();
            let bandwidth = kde::silverman_bandwidth(&pooled);
            let grid = shared_grid(&pooled, bandwidth, config.density_points);

            let mut trace = Vec::with_capacity(chains.len());
            let mut trace_stride = 1;
            for chain in &chains {
                let (points, stride) = thin(chain, config.trace_points);
                trace.push(points);
                trace_stride = stride;
            }

            TermDiagnostics {
                term: term.clone(),
                rhat: mcmc::split_rhat(&chains),
                ess: mcmc::effective_sample_size(&chains),
                trace,
                trace_stride,
                density: chains
                    .iter()
                    .map(|c| kde::gaussian_kde(c, &grid, bandwidth))
                    .collect(),
                density_grid: grid,
                acf: chains
                    .iter()
                    .map(|c| mcmc::autocorrelation(c, config.max_lag))
                    .collect(),
            }
        })
        .collect();

    Diagnostics {
        model: fit.name.clone(),
        chains: draws.n_chains(),
        draws_per_chain: draws.chains.first().map(|c| c.draws.len()).unwrap_or(0),
        divergences: draws.divergences(),
        step_sizes: draws.chains.iter().map(|c| c.step_size).collect(),
        accept_rates: draws.chains.iter().map(|c| c.accept_rate).collect(),
        terms,
    }
}
