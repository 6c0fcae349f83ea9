//! Confusion-matrix classification accuracy.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hlb_common::{Error, Result};

use crate::model::FittedModel;

/// Counts of predicted against actual outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Classify `probs` at `threshold` (p >= threshold is Yes) against `actual`.
    pub fn from_probabilities(probs: &[f64], actual: &[bool], threshold: f64) -> Result<Self> {
        if probs.len() != actual.len() {
            return Err(Error::Sampler(format!(
                "{} predictions for {} outcomes",
                probs.len(),
                actual.len()
            )));
        }
        let mut m = ConfusionMatrix::default();
        for (p, &y) in probs.iter().zip(actual) {
            match (*p >= threshold, y) {
                (true, true) => m.tp += 1,
                (false, false) => m.tn += 1,
                (true, false) => m.fp += 1,
                (false, true) => m.fn_ += 1,
            }
        }
        Ok(m)
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    pub fn correct(&self) -> usize {
        self.tp + self.tn
    }

    /// (TP + TN) / total; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    pub fn precision(&self) -> Option<f64> {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> Option<f64> {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> Option<f64> {
        let (p, r) = (self.precision()?, self.recall()?);
        if p + r == 0.0 {
            None
        } else {
            Some(2.0 * p * r / (p + r))
        }
    }

    /// Merge counts from another matrix.
    pub fn add(&self, other: &ConfusionMatrix) -> ConfusionMatrix {
        ConfusionMatrix {
            tp: self.tp + other.tp,
            tn: self.tn + other.tn,
            fp: self.fp + other.fp,
            fn_: self.fn_ + other.fn_,
        }
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// In-sample accuracy of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccuracyReport {
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub total: usize,
    pub accuracy: f64,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
}

impl AccuracyReport {
    pub fn from_confusion(confusion: ConfusionMatrix, threshold: f64) -> Self {
        AccuracyReport {
            threshold,
            total: confusion.total(),
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            confusion,
        }
    }
}

/// Classify every training row by its posterior mean probability.
pub fn classification_accuracy(fit: &FittedModel, threshold: f64) -> Result<AccuracyReport> {
    let probs = fit.fitted_proba()?;
    let confusion = ConfusionMatrix::from_probabilities(&probs, fit.design.outcomes(), threshold)?;
    Ok(AccuracyReport::from_confusion(confusion, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::quick_fit;

    #[test]
    fn counts_and_rates() {
        let probs = [0.9, 0.6, 0.4, 0.1, 0.5];
        let actual = [true, false, true, false, true];
        let m = ConfusionMatrix::from_probabilities(&probs, &actual, 0.5).unwrap();
        assert_eq!(m, ConfusionMatrix { tp: 2, tn: 1, fp: 1, fn_: 1 });
        assert_eq!(m.total(), 5);
        assert!((m.accuracy() - 0.6).abs() < 1e-12);
        assert_eq!(m.precision(), Some(2.0 / 3.0));
        assert_eq!(m.recall(), Some(2.0 / 3.0));
        assert!((m.f1().unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_matrices() {
        let m = ConfusionMatrix::default();
        assert_eq!(m.accuracy(), 0.0);
        assert_eq!(m.precision(), None);
        let all_no = ConfusionMatrix::from_probabilities(&[0.1, 0.2], &[false, false], 0.5).unwrap();
        assert_eq!(all_no.accuracy(), 1.0);
        assert_eq!(all_no.recall(), None);
        assert!(ConfusionMatrix::from_probabilities(&[0.1], &[], 0.5).is_err());
    }

    #[test]
    fn serializes_fn_field() {
        let m = ConfusionMatrix { tp: 1, tn: 2, fp: 3, fn_: 4 };
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["fn"], 4);
    }

    #[test]
    fn fitted_accuracy_is_a_proportion() {
        let fit = quick_fit(&["Genetics", "Age"]);
        let r = classification_accuracy(&fit, 0.5).unwrap();
        assert_eq!(r.total, fit.design.n_rows());
        assert!((0.0..=1.0).contains(&r.accuracy));
        let expected = r.confusion.correct() as f64 / r.total as f64;
        assert!((r.accuracy - expected).abs() < 1e-12);
        assert!(r.accuracy > 0.6);
    }
}
