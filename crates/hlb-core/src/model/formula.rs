//! Model formulas: `Hair.Loss ~ p1 + p2 + ...`.

use hlb_common::{Error, Result};
use hlb_config::ModelSpec;

use crate::data::{Column, SurveyTable};

/// Ordered, duplicate-free set of predictor columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictorSet(Vec<Column>);

impl PredictorSet {
    /// Resolve predictor names in any supported header spelling.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> std::result::Result<PredictorSet, String> {
        if names.is_empty() {
            return Err("at least one predictor is required".to_string());
        }
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let column = Column::from_header(name)
                .ok_or_else(|| format!("'{}' is not a survey column", name))?;
            if !column.is_predictor() {
                return Err(format!("{} cannot be used as a predictor", column));
            }
            if columns.contains(&column) {
                return Err(format!("{} is listed twice", column));
            }
            columns.push(column);
        }
        Ok(PredictorSet(columns))
    }

    pub fn columns(&self) -> &[Column] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, column: Column) -> bool {
        self.0.contains(&column)
    }
}

/// A named logistic model of Hair.Loss on a predictor set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    pub model: String,
    pub predictors: PredictorSet,
}

impl Formula {
    pub fn from_spec(spec: &ModelSpec) -> Result<Formula> {
        let predictors =
            PredictorSet::parse(&spec.predictors).map_err(|m| Error::formula(&spec.name, m))?;
        Ok(Formula {
            model: spec.name.clone(),
            predictors,
        })
    }

    /// Every predictor column must be present in the table.
    pub fn validate_against(&self, table: &SurveyTable) -> Result<()> {
        let missing: Vec<&str> = self
            .predictors
            .columns()
            .iter()
            .filter(|c| !table.has_column(**c))
            .map(|c| c.name())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::formula(
                &self.model,
                format!("column(s) {} not in the cleaned table", missing.join(", ")),
            ))
        }
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rhs: Vec<&str> = self.predictors.columns().iter().map(|c| c.name()).collect();
        write!(f, "{} ~ {}", Column::HairLoss.name(), rhs.join(" + "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_spellings_in_order() {
        let set = PredictorSet::parse(&["Age", "Hormonal Changes", "Medications...Treatments"]).unwrap();
        assert_eq!(
            set.columns(),
            [Column::Age, Column::HormonalChanges, Column::MedicationsTreatments]
        );
    }

    #[test]
    fn rejects_bad_predictor_lists() {
        assert!(PredictorSet::parse::<&str>(&[]).is_err());
        assert!(PredictorSet::parse(&["Shoe.Size"]).is_err());
        assert!(PredictorSet::parse(&["Hair.Loss"]).is_err());
        assert!(PredictorSet::parse(&["Id"]).is_err());
        let err = PredictorSet::parse(&["Genetics", "genetics"]).unwrap_err();
        assert!(err.contains("twice"));
    }

    #[test]
    fn formula_text_uses_r_names() {
        let spec = ModelSpec::new("model4", &["Genetics", "Weight Loss", "Medical Conditions"]);
        let f = Formula::from_spec(&spec).unwrap();
        assert_eq!(
            f.to_string(),
            "Hair.Loss ~ Genetics + Weight.Loss + Medical.Conditions"
        );
    }

    #[test]
    fn bad_spec_is_formula_error() {
        let spec = ModelSpec::new("broken", &["Height"]);
        let err = Formula::from_spec(&spec).unwrap_err();
        assert_eq!(err.code(), 23);
    }
}
