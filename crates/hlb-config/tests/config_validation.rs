//! Configuration parsing and validation against full analysis.json documents.

use hlb_config::preset::{get_preset, list_presets, PresetName};
use hlb_config::validate::{validate_analysis, ValidationError};
use hlb_config::{AnalysisConfig, DuplicatePolicy};

const FULL_CONFIG: &str = r#"{
  "schema_version": "1.0.0",
  "outcome_threshold": 0.5,
  "credible_level": 0.8,
  "cleaning": {
    "sentinel": "No Data",
    "duplicates": {"policy": "drop_listed", "ids": ["110171", "140211"]},
    "level_orders": {"Stress": ["Low", "Moderate", "High"]}
  },
  "priors": {
    "base_rate": {"low": 0.16, "high": 0.5},
    "intercept_override": {"mean": -0.83, "scale": 0.4},
    "coefficient_scale": 2.5,
    "autoscale": true
  },
  "sampler": {"chains": 4, "iterations": 2000, "warmup": null, "seed": 123,
              "target_accept": 0.8, "max_leapfrog_steps": 256},
  "diagnostics": {"max_lag": 20, "rhat_threshold": 1.05, "min_ess_per_chain": 100,
                  "trace_points": 60, "density_points": 48},
  "ppc": {"n_reps": 200, "seed": 321, "level": 0.9},
  "cross_validation": {"enabled": true, "folds": 10, "seed": 42,
                       "sampler": {"chains": 2, "iterations": 600}},
  "models": [
    {"name": "model1", "predictors": ["Age", "Genetics", "Hormonal.Changes"]},
    {"name": "model4", "predictors": ["Genetics", "Weight.Loss", "Medical.Conditions"]}
  ]
}"#;

#[test]
fn full_document_parses_and_validates() {
    let cfg: AnalysisConfig = serde_json::from_str(FULL_CONFIG).expect("parse config");
    validate_analysis(&cfg).expect("valid config");

    assert_eq!(cfg.models.len(), 2);
    assert_eq!(
        cfg.cleaning.duplicates,
        DuplicatePolicy::DropListed {
            ids: vec!["110171".into(), "140211".into()]
        }
    );
    let intercept = cfg.priors.intercept_override.expect("override present");
    assert_eq!(intercept.mean, -0.83);
    assert_eq!(cfg.cv_sampler().iterations, 600);
    assert_eq!(cfg.cv_sampler().warmup_iterations(), 300);
}

#[test]
fn json_round_trip_preserves_config() {
    let cfg: AnalysisConfig = serde_json::from_str(FULL_CONFIG).unwrap();
    let text = serde_json::to_string_pretty(&cfg).unwrap();
    let back: AnalysisConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(cfg, back);
}

#[test]
fn empty_level_order_is_rejected() {
    let mut cfg = AnalysisConfig::default();
    cfg.cleaning.level_orders.insert("Stress".into(), Vec::new());
    match validate_analysis(&cfg) {
        Err(ValidationError::InvalidValue { field, .. }) => {
            assert_eq!(field, "cleaning.level_orders.Stress")
        }
        other => panic!("expected invalid value, got {:?}", other),
    }
}

#[test]
fn model_without_predictors_is_rejected() {
    let doc = r#"{"models": [{"name": "empty", "predictors": []}]}"#;
    let cfg: AnalysisConfig = serde_json::from_str(doc).unwrap();
    let err = validate_analysis(&cfg).unwrap_err();
    assert_eq!(err.field(), Some("models[0].predictors"));
}

#[test]
fn out_of_range_credible_level_is_rejected() {
    for level in [0.0, 1.0, 1.5, -0.2] {
        let cfg = AnalysisConfig {
            credible_level: level,
            ..AnalysisConfig::default()
        };
        assert!(validate_analysis(&cfg).is_err(), "level {level} accepted");
    }
}

#[test]
fn presets_are_deterministic() {
    for (name, description) in list_presets() {
        assert!(!description.is_empty());
        assert_eq!(get_preset(name), get_preset(name));
    }
    let defaults = AnalysisConfig::default();
    let names: Vec<&str> = defaults.models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["model1", "model2", "model3", "model4"]);
    assert_eq!(
        get_preset(PresetName::Model4).predictors,
        ["Genetics", "Weight.Loss", "Medical.Conditions"]
    );
}

#[test]
fn schema_lists_every_section() {
    let schema = schemars::schema_for!(AnalysisConfig);
    let value = serde_json::to_value(&schema).unwrap();
    let props = value["properties"].as_object().expect("properties");
    for key in [
        "cleaning",
        "priors",
        "sampler",
        "diagnostics",
        "ppc",
        "cross_validation",
        "models",
    ] {
        assert!(props.contains_key(key), "schema lacks {key}");
    }
}
