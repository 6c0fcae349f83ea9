//! Treatment-coded design matrix.
//!
//! Each factor contributes one 0/1 indicator per non-reference level. The
//! reference is the first level in level order that is observed in the
//! table; levels with no observations contribute no term. Age enters as a
//! single numeric term.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hlb_common::{Error, Result};
use hlb_math::{mean, std_dev};

use super::formula::Formula;
use crate::data::{Column, SurveyTable};

/// One column of the design matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Term {
    /// Coefficient name, e.g. `GeneticsYes`, `StressModerate`, `Age`.
    pub name: String,
    pub column: Column,
    /// Indicated level; None for numeric terms.
    pub level: Option<String>,
}

/// Row-major predictor matrix plus outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    terms: Vec<Term>,
    values: Vec<f64>,
    y: Vec<bool>,
}

impl DesignMatrix {
    /// Build the design for `formula` over `table`.
    pub fn build(table: &SurveyTable, formula: &Formula) -> Result<DesignMatrix> {
        formula.validate_against(table)?;
        if table.is_empty() {
            return Err(Error::formula(&formula.model, "the cleaned table has no rows"));
        }

        let n = table.len();
        let mut terms = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();

        for &column in formula.predictors.columns() {
            if column == Column::Age {
                if let Some(age) = table.age() {
                    terms.push(Term {
                        name: column.name().to_string(),
                        column,
                        level: None,
                    });
                    columns.push(age.to_vec());
                }
                continue;
            }
            let Some(factor) = table.factor(column) else {
                continue;
            };
            let counts = factor.level_counts();
            let observed: Vec<usize> = (0..factor.levels.len()).filter(|&l| counts[l] > 0).collect();
            for &level in observed.iter().skip(1) {
                let label = &factor.levels[level];
                terms.push(Term {
                    name: format!("{}{}", column.name(), label),
                    column,
                    level: Some(label.clone()),
                });
                columns.push(
                    factor
                        .codes
                        .iter()
                        .map(|&c| if c == level { 1.0 } else { 0.0 })
                        .collect(),
                );
            }
        }

        if terms.is_empty() {
            return Err(Error::formula(
                &formula.model,
                "design matrix has no terms; every predictor is constant",
            ));
        }

        let p = terms.len();
        let mut values = vec![0.0; n * p];
        for (j, col) in columns.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                values[i * p + j] = *v;
            }
        }

        Ok(DesignMatrix {
            terms,
            values,
            y: table.outcomes().iter().map(|o| o.is_yes()).collect(),
        })
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn term_names(&self) -> Vec<String> {
        self.terms.iter().map(|t| t.name.clone()).collect()
    }

    pub fn n_rows(&self) -> usize {
        self.y.len()
    }

    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let p = self.n_terms();
        &self.values[i * p..(i + 1) * p]
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.n_rows()).map(|i| self.row(i)[j]).collect()
    }

    pub fn outcomes(&self) -> &[bool] {
        &self.y
    }

    /// Mean of every column.
    pub fn column_means(&self) -> Vec<f64> {
        (0..self.n_terms()).map(|j| mean(&self.column(j))).collect()
    }

    /// Per column, the number of distinct values, the range and the
    /// standard deviation.
    pub fn column_spread(&self, j: usize) -> ColumnSpread {
        let col = self.column(j);
        let mut sorted = col.clone();
        sorted.sort_by(f64::total_cmp);
        sorted.dedup();
        let range = match (sorted.first(), sorted.last()) {
            (Some(lo), Some(hi)) => hi - lo,
            _ => 0.0,
        };
        ColumnSpread {
            distinct: sorted.len(),
            range,
            sd: std_dev(&col),
        }
    }

    /// New design with the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> DesignMatrix {
        let mut values = Vec::with_capacity(rows.len() * self.n_terms());
        for &i in rows {
            values.extend_from_slice(self.row(i));
        }
        DesignMatrix {
            terms: self.terms.clone(),
            values,
            y: rows.iter().map(|&i| self.y[i]).collect(),
        }
    }
}

/// Spread of one design column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSpread {
    pub distinct: usize,
    pub range: f64,
    pub sd: f64,
}
