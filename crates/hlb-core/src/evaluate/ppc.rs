//! Posterior predictive check on the proportion of positive outcomes.
//!
//! For each replicate a posterior draw is chosen at random, an outcome
//! vector is simulated from it, and the statistic is recomputed. The
//! p-value is P(T_rep >= T_obs); values near 0 or 1 indicate the model
//! cannot reproduce the observed prevalence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use hlb_common::{Error, Result};
use hlb_config::PpcSettings;
use hlb_math::{equal_tailed_interval, mean, sigmoid, std_dev, Interval};

use crate::model::FittedModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PpcResult {
    pub statistic: &'static str,
    pub observed: f64,
    pub n_reps: usize,
    pub seed: u64,
    pub simulated_mean: f64,
    pub simulated_sd: f64,
    pub interval: Interval,
    pub p_value: f64,
}

impl PpcResult {
    /// The observed statistic lies inside the simulated interval.
    pub fn consistent(&self) -> bool {
        self.interval.contains(self.observed)
    }
}

pub fn posterior_predictive_check(fit: &FittedModel, settings: &PpcSettings) -> Result<PpcResult> {
    if settings.n_reps == 0 {
        return Err(Error::Config("ppc.n_reps must be at least 1".to_string()));
    }
    let design = &fit.design;
    let n = design.n_rows();
    if n == 0 {
        return Err(Error::Sampler(format!("{}: no rows to check", fit.name)));
    }
    let draws: Vec<&[f64]> = fit.draws.iter().collect();
    if draws.is_empty() {
        return Err(Error::Sampler(format!("{} has no posterior draws", fit.name)));
    }

    let observed = design.outcomes().iter().filter(|y| **y).count() as f64 / n as f64;
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut simulated = Vec::with_capacity(settings.n_reps);
    for _ in 0..settings.n_reps {
        let theta = draws[rng.random_range(0..draws.len())];
        let mut positives = 0usize;
        for i in 0..n {
            let eta = theta[0]
                + design
                    .row(i)
                    .iter()
                    .zip(&theta[1..])
                    .map(|(x, b)| x * b)
                    .sum::<f64>();
            if rng.random::<f64>() < sigmoid(eta) {
                positives += 1;
            }
        }
        simulated.push(positives as f64 / n as f64);
    }

    let interval = equal_tailed_interval(&simulated, settings.level)
        .ok_or_else(|| Error::Config(format!("ppc.level {} must be in (0, 1)", settings.level)))?;
    let exceed = simulated.iter().filter(|t| **t >= observed).count();

    Ok(PpcResult {
        statistic: "proportion_yes",
        observed,
        n_reps: settings.n_reps,
        seed: settings.seed,
        simulated_mean: mean(&simulated),
        simulated_sd: std_dev(&simulated),
        interval,
        p_value: exceed as f64 / settings.n_reps as f64,
    })
}
