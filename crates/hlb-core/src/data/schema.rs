//! Survey column schema.
//!
//! Column headers arrive in several spellings: the raw survey export
//! (`Hormonal Changes`, `Medications & Treatments`, `Nutritional Deficiencies `)
//! and the R-style names (`Hormonal.Changes`, `Medications...Treatments`).
//! All of them resolve to the same [`Column`] by comparing lowercase
//! alphanumerics only.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A known survey column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Column {
    Id,
    Genetics,
    HormonalChanges,
    MedicalConditions,
    MedicationsTreatments,
    NutritionalDeficiencies,
    Stress,
    Age,
    PoorHairCareHabits,
    EnvironmentalFactors,
    Smoking,
    WeightLoss,
    HairLoss,
}

/// How a column is typed after cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Identifier,
    /// Two-level factor, `No < Yes`.
    Binary,
    /// Ordered factor with a fixed level order.
    Ordinal,
    /// Unordered factor; levels sorted unless configured.
    Nominal,
    Numeric,
    /// 0/1 outcome recoded to `No`/`Yes`.
    Outcome,
}

const BINARY_LEVELS: &[&str] = &["No", "Yes"];
const STRESS_LEVELS: &[&str] = &["Low", "Moderate", "High"];

impl Column {
    /// Every column in file order.
    pub const ALL: &'static [Column] = &[
        Column::Id,
        Column::Genetics,
        Column::HormonalChanges,
        Column::MedicalConditions,
        Column::MedicationsTreatments,
        Column::NutritionalDeficiencies,
        Column::Stress,
        Column::Age,
        Column::PoorHairCareHabits,
        Column::EnvironmentalFactors,
        Column::Smoking,
        Column::WeightLoss,
        Column::HairLoss,
    ];

    /// The ten categorical risk factors.
    pub const RISK_FACTORS: &'static [Column] = &[
        Column::Genetics,
        Column::HormonalChanges,
        Column::MedicalConditions,
        Column::MedicationsTreatments,
        Column::NutritionalDeficiencies,
        Column::Stress,
        Column::PoorHairCareHabits,
        Column::EnvironmentalFactors,
        Column::Smoking,
        Column::WeightLoss,
    ];

    /// R-style name used in formulas and coefficient names.
    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "Id",
            Column::Genetics => "Genetics",
            Column::HormonalChanges => "Hormonal.Changes",
            Column::MedicalConditions => "Medical.Conditions",
            Column::MedicationsTreatments => "Medications...Treatments",
            Column::NutritionalDeficiencies => "Nutritional.Deficiencies",
            Column::Stress => "Stress",
            Column::Age => "Age",
            Column::PoorHairCareHabits => "Poor.Hair.Care.Habits",
            Column::EnvironmentalFactors => "Environmental.Factors",
            Column::Smoking => "Smoking",
            Column::WeightLoss => "Weight.Loss",
            Column::HairLoss => "Hair.Loss",
        }
    }

    /// Header as it appears in the raw survey export.
    pub fn label(&self) -> &'static str {
        match self {
            Column::Id => "Id",
            Column::Genetics => "Genetics",
            Column::HormonalChanges => "Hormonal Changes",
            Column::MedicalConditions => "Medical Conditions",
            Column::MedicationsTreatments => "Medications & Treatments",
            Column::NutritionalDeficiencies => "Nutritional Deficiencies",
            Column::Stress => "Stress",
            Column::Age => "Age",
            Column::PoorHairCareHabits => "Poor Hair Care Habits",
            Column::EnvironmentalFactors => "Environmental Factors",
            Column::Smoking => "Smoking",
            Column::WeightLoss => "Weight Loss",
            Column::HairLoss => "Hair Loss",
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Id => ColumnKind::Identifier,
            Column::Age => ColumnKind::Numeric,
            Column::HairLoss => ColumnKind::Outcome,
            Column::Stress => ColumnKind::Ordinal,
            Column::MedicalConditions
            | Column::MedicationsTreatments
            | Column::NutritionalDeficiencies => ColumnKind::Nominal,
            _ => ColumnKind::Binary,
        }
    }

    /// Built-in level order, if the column has one.
    pub fn default_levels(&self) -> Option<&'static [&'static str]> {
        match self.kind() {
            ColumnKind::Binary => Some(BINARY_LEVELS),
            ColumnKind::Ordinal => Some(STRESS_LEVELS),
            _ => None,
        }
    }

    /// Whether the column can appear on the right-hand side of a formula.
    pub fn is_predictor(&self) -> bool {
        !matches!(self, Column::Id | Column::HairLoss)
    }

    /// Resolve a header in any supported spelling.
    pub fn from_header(header: &str) -> Option<Column> {
        let key = normalize_header(header);
        if key.is_empty() {
            return None;
        }
        Column::ALL
            .iter()
            .copied()
            .find(|c| normalize_header(c.name()) == key)
            .or(match key.as_str() {
                "medicationsandtreatments" => Some(Column::MedicationsTreatments),
                "hairfall" => Some(Column::HairLoss),
                _ => None,
            })
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowercase ASCII alphanumerics of a header (BOM, spaces, dots and `&` dropped).
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
