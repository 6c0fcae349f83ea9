//! End-to-end pipeline tests on the fixture survey and synthetic data.

use hlb_config::{AnalysisConfig, ModelSpec, SamplerSettings};
use hlb_core::data::{clean, load_csv, CleaningOptions, Column};
use hlb_core::evaluate::{summarize, RankKey};
use hlb_core::logging::LogContext;
use hlb_core::model::{
    ChainDraws, HmcSampler, LogitProblem, PosteriorDraws, PosteriorSampler, SamplerConfig,
};
use hlb_core::pipeline::Pipeline;
use hlb_core::test_utils::{fixture_path, quick_fit, SyntheticSurvey};

fn fast_config() -> AnalysisConfig {
    let mut cfg = AnalysisConfig {
        sampler: SamplerSettings {
            chains: 2,
            iterations: 400,
            ..SamplerSettings::default()
        },
        ..AnalysisConfig::default()
    };
    cfg.ppc.n_reps = 50;
    cfg.cross_validation.folds = 3;
    cfg.cross_validation.sampler = Some(SamplerSettings {
        chains: 1,
        iterations: 300,
        ..SamplerSettings::default()
    });
    cfg
}

fn ctx() -> LogContext {
    LogContext::new("run-e2e", "host-e2e")
}

#[test]
fn fixture_analysis_covers_every_preset() {
    let cfg = fast_config();
    let sampler = HmcSampler::default();
    let report = Pipeline::new(&cfg, &sampler, ctx())
        .analyze(&fixture_path("hair_loss_small.csv"))
        .unwrap();

    assert_eq!(report.input.rows, 91);
    assert_eq!(report.cleaning.rows_out, 86);
    assert_eq!(report.models.len(), 4);
    assert_eq!(report.comparison.ranked_by, RankKey::CvAccuracy);

    for model in &report.models {
        assert!((0.0..=1.0).contains(&model.accuracy.accuracy));
        assert_eq!(model.accuracy.total, 86);
        let cm = &model.accuracy.confusion;
        assert_eq!(cm.tp + cm.tn + cm.fp + cm.fn_, 86);
        let cv = model.cv.as_ref().unwrap();
        let held_out: usize = cv.fold_results.iter().map(|f| f.test_rows).sum();
        assert_eq!(held_out, 86);
    }

    // model1 = Age + Genetics + Hormonal.Changes: intercept plus one term each.
    let model1 = report.models.iter().find(|m| m.model == "model1").unwrap();
    assert_eq!(model1.coefficients, 4);

    // model4 = Genetics + Weight.Loss + Medical.Conditions: one indicator per
    // observed condition after the reference level.
    let table = clean(
        &load_csv(fixture_path("hair_loss_small.csv")).unwrap(),
        &CleaningOptions::default(),
    )
    .unwrap()
    .table;
    let conditions = table.factor(Column::MedicalConditions).unwrap();
    let observed: Vec<&String> = conditions
        .levels
        .iter()
        .zip(conditions.level_counts())
        .filter(|(_, n)| *n > 0)
        .map(|(level, _)| level)
        .collect();
    let mut expected = vec![
        "(Intercept)".to_string(),
        "GeneticsYes".to_string(),
        "Weight.LossYes".to_string(),
    ];
    expected.extend(
        observed
            .iter()
            .skip(1)
            .map(|level| format!("Medical.Conditions{level}")),
    );

    let model4 = report.models.iter().find(|m| m.model == "model4").unwrap();
    assert_eq!(model4.coefficients, expected.len());
    let terms: Vec<&str> = model4
        .summary
        .coefficients
        .iter()
        .map(|c| c.term.as_str())
        .collect();
    assert_eq!(terms, expected);
    assert!(terms.contains(&"Medical.ConditionsScalp Infection"));
    assert!(!terms.contains(&"Medical.ConditionsNo Data"));
}

#[test]
fn strong_effect_is_significant() {
    let fit = quick_fit(&["Genetics", "Smoking"]);
    let summary = summarize(&fit, 0.8).unwrap();
    let genetics = summary.coefficient("GeneticsYes").unwrap();
    assert!(genetics.significant);
    assert!(genetics.median > 1.0, "median {}", genetics.median);
    assert!(genetics.odds_ratio > 1.0);
    assert!(summary.significant_predictors().contains(&Column::Genetics));
}

#[test]
fn analysis_is_reproducible() {
    let mut cfg = fast_config();
    cfg.cross_validation.enabled = false;
    cfg.models = vec![ModelSpec::new("g", &["Genetics", "Weight.Loss"])];
    let sampler = HmcSampler::default();
    let path = fixture_path("hair_loss_small.csv");

    let a = Pipeline::new(&cfg, &sampler, ctx()).analyze(&path).unwrap();
    let b = Pipeline::new(&cfg, &sampler, ctx()).analyze(&path).unwrap();
    assert_eq!(a.models[0].summary, b.models[0].summary);
    assert_eq!(a.models[0].ppc, b.models[0].ppc);
}

/// A sampler that returns the prior mean for every draw.
struct PointSampler;

impl PosteriorSampler for PointSampler {
    fn name(&self) -> &'static str {
        "point"
    }

    fn sample(
        &self,
        problem: &LogitProblem,
        config: &SamplerConfig,
    ) -> hlb_common::Result<PosteriorDraws> {
        let theta = vec![0.0; problem.dim()];
        let chains = (0..config.chains)
            .map(|_| ChainDraws {
                draws: vec![theta.clone(); config.draws],
                divergences: 0,
                step_size: 0.0,
                accept_rate: 1.0,
                mean_leapfrog_steps: 0.0,
            })
            .collect();
        Ok(PosteriorDraws {
            param_names: problem.param_names().to_vec(),
            chains,
        })
    }
}

#[test]
fn samplers_are_pluggable() {
    let mut cfg = fast_config();
    cfg.cross_validation.enabled = false;
    cfg.models.truncate(1);
    let csv = SyntheticSurvey::default().to_csv();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synthetic.csv");
    std::fs::write(&path, csv).unwrap();

    let report = Pipeline::new(&cfg, &PointSampler, ctx())
        .analyze(&path)
        .unwrap();
    let summary = &report.models[0].summary;
    assert!(summary.coefficients.iter().all(|c| c.median == 0.0));
    assert_eq!(report.models[0].diagnostics.divergences, 0);
}
