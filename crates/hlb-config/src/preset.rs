//! Model presets of the survey analysis.
//!
//! - model1: demographic and hereditary baseline
//! - model2: adds lifestyle and habit factors
//! - model3: adds medical history (every risk factor)
//! - model4: reduced set of the factors that stood out in model3

use crate::analysis::ModelSpec;
use serde::{Deserialize, Serialize};
use std::fmt;

const MODEL1: &[&str] = &["Age", "Genetics", "Hormonal.Changes"];

const MODEL2_EXTRA: &[&str] = &[
    "Stress",
    "Poor.Hair.Care.Habits",
    "Environmental.Factors",
    "Smoking",
    "Weight.Loss",
];

const MODEL3_EXTRA: &[&str] = &[
    "Medical.Conditions",
    "Medications...Treatments",
    "Nutritional.Deficiencies",
];

const MODEL4: &[&str] = &["Genetics", "Weight.Loss", "Medical.Conditions"];

/// Built-in model presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    Model1,
    Model2,
    Model3,
    Model4,
}

impl PresetName {
    /// All presets in report order.
    pub const ALL: &'static [PresetName] = &[
        PresetName::Model1,
        PresetName::Model2,
        PresetName::Model3,
        PresetName::Model4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetName::Model1 => "model1",
            PresetName::Model2 => "model2",
            PresetName::Model3 => "model3",
            PresetName::Model4 => "model4",
        }
    }

    pub fn parse(s: &str) -> Option<PresetName> {
        match s.trim().to_lowercase().as_str() {
            "model1" | "m1" | "1" => Some(PresetName::Model1),
            "model2" | "m2" | "2" => Some(PresetName::Model2),
            "model3" | "m3" | "3" | "full" => Some(PresetName::Model3),
            "model4" | "m4" | "4" | "reduced" => Some(PresetName::Model4),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PresetName::Model1 => "Age, genetics and hormonal changes",
            PresetName::Model2 => "model1 plus stress, habits, environment, smoking and weight loss",
            PresetName::Model3 => "every risk factor",
            PresetName::Model4 => "genetics, weight loss and medical conditions",
        }
    }

    /// Predictor names in formula order.
    pub fn predictors(&self) -> Vec<&'static str> {
        match self {
            PresetName::Model1 => MODEL1.to_vec(),
            PresetName::Model2 => [MODEL1, MODEL2_EXTRA].concat(),
            PresetName::Model3 => [MODEL1, MODEL2_EXTRA, MODEL3_EXTRA].concat(),
            PresetName::Model4 => MODEL4.to_vec(),
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model spec for a preset.
pub fn get_preset(name: PresetName) -> ModelSpec {
    ModelSpec::new(name.as_str(), &name.predictors())
}

/// Name and description of every preset.
pub fn list_presets() -> Vec<(PresetName, &'static str)> {
    PresetName::ALL
        .iter()
        .map(|p| (*p, p.description()))
        .collect()
}

/// The four preset models in report order.
pub fn preset_models() -> Vec<ModelSpec> {
    PresetName::ALL.iter().map(|p| get_preset(*p)).collect()
}
