//! Test utilities for hlb-core.
//!
//! - Synthetic survey CSVs with known effects
//! - Fixture paths
//! - Small sampler settings and one-call model fits

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hlb_config::{ModelSpec, PriorConfig};
use hlb_math::sigmoid;

use crate::data::{clean, read_csv, CleaningOptions, SurveyTable};
use crate::model::{fit_model, FittedModel, HmcSampler, SamplerConfig};

// ============================================================================
// Fixtures
// ============================================================================

/// Fixture directory relative to crate root.
pub const FIXTURES_DIR: &str = "tests/fixtures";

/// Get the path to a test fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join(FIXTURES_DIR).join(name)
}

// ============================================================================
// Synthetic surveys
// ============================================================================

/// Raw export header row, trailing spaces included.
pub const SURVEY_HEADER: &str = "Id,Genetics,Hormonal Changes,Medical Conditions,Medications & Treatments,Nutritional Deficiencies ,Stress,Age,Poor Hair Care Habits ,Environmental Factors,Smoking,Weight Loss ,Hair Loss";

const CONDITIONS: &[&str] = &[
    "No",
    "Eczema",
    "Psoriasis",
    "Dandruff",
    "Alopecia Areata",
    "Thyroid Problems",
];
const MEDICATIONS: &[&str] = &[
    "No",
    "Antibiotics",
    "Accutane",
    "Minoxidil",
    "Rogaine",
    "Steroids",
];
const DEFICIENCIES: &[&str] = &[
    "Zinc Deficiency",
    "Iron deficiency",
    "Vitamin D Deficiency",
    "Biotin Deficiency ",
    "Magnesium deficiency",
];
const STRESS: &[&str] = &["Low", "Moderate", "High"];

/// Generator of survey rows with a known logistic model.
///
/// Log odds of hair loss:
/// `-0.6 + 2.2 Genetics + 0.9 Weight.Loss + 0.6 Hormonal.Changes
///  + 1.0 [Medical.Conditions = Alopecia Areata]`.
/// A share of rows carry the sentinel and one identifier is duplicated.
#[derive(Debug, Clone)]
pub struct SyntheticSurvey {
    pub rows: usize,
    pub seed: u64,
    /// Probability that a row has `No Data` in Medical Conditions.
    pub sentinel_rate: f64,
    /// Append a second row reusing the first identifier.
    pub duplicate_first: bool,
}

impl Default for SyntheticSurvey {
    fn default() -> Self {
        SyntheticSurvey {
            rows: 240,
            seed: 17,
            sentinel_rate: 0.05,
            duplicate_first: true,
        }
    }
}

impl SyntheticSurvey {
    pub fn to_csv(&self) -> String {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut out = String::from(SURVEY_HEADER);
        out.push('\n');
        let mut first_id = None;
        for i in 0..self.rows {
            let id = 100_000 + i * 7;
            first_id.get_or_insert(id);
            let line = synthetic_row(&mut rng, id, self.sentinel_rate);
            out.push_str(&line);
            out.push('\n');
        }
        if let (true, Some(id)) = (self.duplicate_first, first_id) {
            out.push_str(&synthetic_row(&mut rng, id, 0.0));
            out.push('\n');
        }
        out
    }

    pub fn to_table(&self) -> SurveyTable {
        let raw = read_csv(self.to_csv().as_bytes(), "synthetic").expect("synthetic csv parses");
        clean(&raw, &CleaningOptions::default())
            .expect("synthetic csv cleans")
            .table
    }
}

fn yes_no(rng: &mut StdRng, p: f64) -> bool {
    rng.random::<f64>() < p
}

fn pick<'a>(rng: &mut StdRng, levels: &[&'a str]) -> &'a str {
    levels[rng.random_range(0..levels.len())]
}

fn synthetic_row(rng: &mut StdRng, id: usize, sentinel_rate: f64) -> String {
    let label = |b: bool| if b { "Yes" } else { "No" };
    let genetics = yes_no(rng, 0.5);
    let hormonal = yes_no(rng, 0.5);
    let condition = pick(rng, CONDITIONS);
    let medication = pick(rng, MEDICATIONS);
    let deficiency = pick(rng, DEFICIENCIES);
    let stress = pick(rng, STRESS);
    let age = rng.random_range(18..52);
    let poor_care = yes_no(rng, 0.5);
    let environment = yes_no(rng, 0.5);
    let smoking = yes_no(rng, 0.5);
    let weight_loss = yes_no(rng, 0.5);

    let eta = -0.6
        + 2.2 * f64::from(u8::from(genetics))
        + 0.9 * f64::from(u8::from(weight_loss))
        + 0.6 * f64::from(u8::from(hormonal))
        + if condition == "Alopecia Areata" { 1.0 } else { 0.0 };
    let hair_loss = yes_no(rng, sigmoid(eta));
    let condition = if yes_no(rng, sentinel_rate) {
        "No Data"
    } else {
        condition
    };

    format!(
        "{},{},{},{},{},{},{},{},{},{},{},{},{}",
        id,
        label(genetics),
        label(hormonal),
        condition,
        medication,
        deficiency,
        stress,
        age,
        label(poor_care),
        label(environment),
        label(smoking),
        label(weight_loss),
        u8::from(hair_loss)
    )
}

/// Default synthetic survey as CSV text.
pub fn synthetic_csv() -> String {
    SyntheticSurvey::default().to_csv()
}

/// Default synthetic survey, cleaned.
pub fn synthetic_table() -> SurveyTable {
    SyntheticSurvey::default().to_table()
}

// ============================================================================
// Fitting
// ============================================================================

/// Two short chains: enough for shape checks, not for inference.
pub fn quick_sampler() -> SamplerConfig {
    SamplerConfig {
        chains: 2,
        warmup: 150,
        draws: 150,
        seed: 99,
        target_accept: 0.8,
        max_leapfrog_steps: 64,
    }
}

/// Fit `predictors` on the default synthetic survey with [`quick_sampler`].
pub fn quick_fit(predictors: &[&str]) -> FittedModel {
    let spec = ModelSpec::new("test-model", predictors);
    fit_model(
        &synthetic_table(),
        &spec,
        &PriorConfig::default(),
        &HmcSampler::default(),
        &quick_sampler(),
    )
    .expect("quick fit succeeds")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    #[test]
    fn synthetic_survey_is_deterministic() {
        assert_eq!(synthetic_csv(), synthetic_csv());
        let other = SyntheticSurvey {
            seed: 18,
            ..SyntheticSurvey::default()
        };
        assert_ne!(other.to_csv(), synthetic_csv());
    }

    #[test]
    fn synthetic_survey_cleans_with_expected_shape() {
        let csv = synthetic_csv();
        assert_eq!(csv.lines().count(), 242);
        let table = synthetic_table();
        assert!(table.len() < 240);
        assert!(table.len() > 200);
        assert_eq!(table.columns().len(), Column::ALL.len());
        let prevalence = table.prevalence();
        assert!(prevalence > 0.3 && prevalence < 0.8, "prevalence {prevalence}");
    }
}
