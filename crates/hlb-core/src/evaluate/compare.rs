//! Model comparison table.

use std::cmp::Ordering;

use serde::Serialize;

use super::ModelEvaluation;

/// Which accuracy the table is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankKey {
    CvAccuracy,
    InSampleAccuracy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub rank: usize,
    pub model: String,
    pub formula: String,
    /// Coefficients including the intercept.
    pub coefficients: usize,
    pub in_sample_accuracy: f64,
    pub cv_accuracy: Option<f64>,
    pub cv_std_error: Option<f64>,
    pub ppc_p_value: f64,
    pub converged: bool,
    pub significant_predictors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComparison {
    pub ranked_by: RankKey,
    pub rows: Vec<ComparisonRow>,
}

impl ModelComparison {
    pub fn best(&self) -> Option<&ComparisonRow> {
        self.rows.first()
    }
}

/// Rank models by CV accuracy when every model has one, else by in-sample
/// accuracy. Ties go to the model with fewer coefficients.
pub fn compare_models(evaluations: &[ModelEvaluation]) -> ModelComparison {
    let ranked_by = if !evaluations.is_empty() && evaluations.iter().all(|e| e.cv.is_some()) {
        RankKey::CvAccuracy
    } else {
        RankKey::InSampleAccuracy
    };
    let key = |e: &ModelEvaluation| match ranked_by {
        RankKey::CvAccuracy => e.cv.as_ref().map(|c| c.accuracy).unwrap_or(f64::NAN),
        RankKey::InSampleAccuracy => e.accuracy.accuracy,
    };

    let mut order: Vec<&ModelEvaluation> = evaluations.iter().collect();
    order.sort_by(|a, b| {
        let (ka, kb) = (key(a), key(b));
        let by_score = match (ka.is_nan(), kb.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => kb.total_cmp(&ka),
        };
        by_score.then(a.coefficients.cmp(&b.coefficients))
    });

    let rows = order
        .into_iter()
        .enumerate()
        .map(|(i, e)| ComparisonRow {
            rank: i + 1,
            model: e.model.clone(),
            formula: e.formula.clone(),
            coefficients: e.coefficients,
            in_sample_accuracy: e.accuracy.accuracy,
            cv_accuracy: e.cv.as_ref().map(|c| c.accuracy),
            cv_std_error: e.cv.as_ref().map(|c| c.std_error),
            ppc_p_value: e.ppc.p_value,
            converged: e.warnings.is_empty(),
            significant_predictors: e
                .summary
                .significant_predictors()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        })
        .collect();

    ModelComparison { ranked_by, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::evaluate_model;
    use crate::test_utils::quick_fit;
    use hlb_config::AnalysisConfig;

    #[test]
    fn ranks_by_in_sample_without_cv() {
        let cfg = AnalysisConfig::default();
        let strong = evaluate_model(&quick_fit(&["Genetics"]), &cfg).unwrap();
        let weak = evaluate_model(&quick_fit(&["Smoking"]), &cfg).unwrap();
        let table = compare_models(&[weak, strong]);
        assert_eq!(table.ranked_by, RankKey::InSampleAccuracy);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].rank, 1);
        assert!(table.rows[0].in_sample_accuracy >= table.rows[1].in_sample_accuracy);
        assert_eq!(table.best().map(|r| r.coefficients), Some(2));
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = compare_models(&[]);
        assert!(table.rows.is_empty());
        assert!(table.best().is_none());
    }
}
