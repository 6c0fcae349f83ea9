//! K-fold cross-validated accuracy.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use hlb_common::{Error, Result};
use hlb_config::PriorConfig;
use hlb_math::std_dev;

use super::accuracy::{AccuracyReport, ConfusionMatrix};
use crate::logging::event_names;
use crate::model::{fit_design, ConvergenceThresholds, FittedModel, PosteriorSampler, SamplerConfig};

/// Split `0..n` into `k` disjoint folds whose union is every index.
///
/// Indices are shuffled with a seeded RNG and dealt round-robin, so fold
/// sizes differ by at most one. Each fold is returned sorted.
pub fn kfold_partition(n: usize, k: usize, seed: u64) -> Result<Vec<Vec<usize>>> {
    if k < 2 {
        return Err(Error::InvalidConfig {
            field: "cross_validation.folds".to_string(),
            message: format!("{} folds requested; at least 2 are needed", k),
        });
    }
    if k > n {
        return Err(Error::InvalidConfig {
            field: "cross_validation.folds".to_string(),
            message: format!("{} folds requested for {} rows", k, n),
        });
    }
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut folds = vec![Vec::with_capacity(n / k + 1); k];
    for (pos, idx) in order.into_iter().enumerate() {
        folds[pos % k].push(idx);
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Settings of one cross-validation run.
#[derive(Debug, Clone, PartialEq)]
pub struct CvOptions {
    pub folds: usize,
    pub seed: u64,
    pub threshold: f64,
    pub sampler: SamplerConfig,
    pub thresholds: ConvergenceThresholds,
}

/// Held-out result of one fold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldResult {
    pub fold: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub convergence_warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvResult {
    pub model: String,
    pub folds: usize,
    pub seed: u64,
    pub fold_results: Vec<FoldResult>,
    /// Pooled held-out confusion matrix and rates.
    pub pooled: AccuracyReport,
    /// Total correct over total rows.
    pub accuracy: f64,
    /// Standard error of the per-fold accuracies.
    pub std_error: f64,
}

/// Refit `fit`'s formula on k-1 folds and score the held-out fold, for
/// every fold. Priors are re-resolved on each training set.
pub fn cross_validate(
    fit: &FittedModel,
    priors: &PriorConfig,
    sampler: &dyn PosteriorSampler,
    options: &CvOptions,
) -> Result<CvResult> {
    let n = fit.design.n_rows();
    let folds = kfold_partition(n, options.folds, options.seed)?;

    let mut fold_results = Vec::with_capacity(folds.len());
    let mut pooled = ConfusionMatrix::default();
    for (f, test) in folds.iter().enumerate() {
        let mut in_test = vec![false; n];
        for &i in test {
            in_test[i] = true;
        }
        let train: Vec<usize> = (0..n).filter(|&i| !in_test[i]).collect();

        let config = options
            .sampler
            .clone()
            .with_seed(options.sampler.seed.wrapping_add(1000 * (f as u64 + 1)));
        let refit = fit_design(
            fit.formula.clone(),
            fit.design.select_rows(&train),
            priors,
            sampler,
            &config,
            &options.thresholds,
        )?;
        let held_out = fit.design.select_rows(test);
        let probs = refit.predict_proba(&held_out)?;
        let confusion =
            ConfusionMatrix::from_probabilities(&probs, held_out.outcomes(), options.threshold)?;
        pooled = pooled.add(&confusion);

        let result = FoldResult {
            fold: f + 1,
            train_rows: train.len(),
            test_rows: test.len(),
            correct: confusion.correct(),
            accuracy: confusion.accuracy(),
            convergence_warnings: refit.warnings.len(),
        };
        tracing::info!(
            target: event_names::EVAL_CV_FOLD,
            model = %fit.name,
            fold = result.fold,
            accuracy = result.accuracy,
            "fold scored"
        );
        fold_results.push(result);
    }

    let per_fold: Vec<f64> = fold_results.iter().map(|r| r.accuracy).collect();
    let std_error = std_dev(&per_fold) / (per_fold.len() as f64).sqrt();
    let pooled = AccuracyReport::from_confusion(pooled, options.threshold);
    Ok(CvResult {
        model: fit.name.clone(),
        folds: options.folds,
        seed: options.seed,
        accuracy: pooled.accuracy,
        fold_results,
        pooled,
        std_error,
    })
}
