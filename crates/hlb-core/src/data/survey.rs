//! Typed survey table produced by cleaning.

use std::collections::BTreeMap;
use std::io::Write;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hlb_common::{Error, Result};

use super::schema::Column;

/// Hair-loss outcome, recoded from the 0/1 survey encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Outcome {
    No,
    Yes,
}

impl Outcome {
    /// Parse `0`/`1` (or `No`/`Yes`, any case).
    pub fn parse(cell: &str) -> Option<Outcome> {
        let cell = cell.trim();
        match cell {
            "0" => Some(Outcome::No),
            "1" => Some(Outcome::Yes),
            _ if cell.eq_ignore_ascii_case("no") => Some(Outcome::No),
            _ if cell.eq_ignore_ascii_case("yes") => Some(Outcome::Yes),
            _ => None,
        }
    }

    pub fn is_yes(self) -> bool {
        self == Outcome::Yes
    }

    /// Survey encoding: 1 for Yes, 0 for No.
    pub fn code(self) -> u8 {
        match self {
            Outcome::No => 0,
            Outcome::Yes => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::No => "No",
            Outcome::Yes => "Yes",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A categorical column: ordered levels and one level index per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Factor {
    pub levels: Vec<String>,
    pub codes: Vec<usize>,
}

impl Factor {
    /// Level label of row `i`.
    pub fn value(&self, i: usize) -> &str {
        &self.levels[self.codes[i]]
    }

    /// Row count per level, in level order.
    pub fn level_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.levels.len()];
        for &c in &self.codes {
            counts[c] += 1;
        }
        counts
    }

    fn select(&self, rows: &[usize]) -> Factor {
        Factor {
            levels: self.levels.clone(),
            codes: rows.iter().map(|&i| self.codes[i]).collect(),
        }
    }
}

/// Borrowed view of one cleaned row.
#[derive(Debug, Clone, Copy)]
pub struct SurveyRecord<'a> {
    table: &'a SurveyTable,
    index: usize,
}

impl<'a> SurveyRecord<'a> {
    pub fn id(&self) -> &'a str {
        &self.table.ids[self.index]
    }

    pub fn outcome(&self) -> Outcome {
        self.table.outcomes[self.index]
    }

    pub fn age(&self) -> Option<f64> {
        self.table.age.as_ref().map(|a| a[self.index])
    }

    /// Level of a categorical column, if the column is present.
    pub fn factor(&self, column: Column) -> Option<&'a str> {
        self.table.factors.get(&column).map(|f| f.value(self.index))
    }

    /// Source file line of this row.
    pub fn line(&self) -> u64 {
        self.table.lines[self.index]
    }
}

/// Cleaned, typed survey data.
///
/// Column-oriented. Risk-factor columns absent from the input file are
/// absent here too. Built by [`crate::data::clean`]; never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyTable {
    pub(crate) ids: Vec<String>,
    pub(crate) outcomes: Vec<Outcome>,
    pub(crate) age: Option<Vec<f64>>,
    pub(crate) factors: BTreeMap<Column, Factor>,
    pub(crate) lines: Vec<u64>,
}

impl SurveyTable {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn age(&self) -> Option<&[f64]> {
        self.age.as_deref()
    }

    pub fn factor(&self, column: Column) -> Option<&Factor> {
        self.factors.get(&column)
    }

    /// Whether the column is present in this table.
    pub fn has_column(&self, column: Column) -> bool {
        match column {
            Column::Id | Column::HairLoss => true,
            Column::Age => self.age.is_some(),
            c => self.factors.contains_key(&c),
        }
    }

    /// Present columns in file order.
    pub fn columns(&self) -> Vec<Column> {
        Column::ALL
            .iter()
            .copied()
            .filter(|c| self.has_column(*c))
            .collect()
    }

    pub fn record(&self, index: usize) -> SurveyRecord<'_> {
        SurveyRecord { table: self, index }
    }

    pub fn records(&self) -> impl Iterator<Item = SurveyRecord<'_>> + '_ {
        (0..self.len()).map(move |index| SurveyRecord { table: self, index })
    }

    /// Proportion of rows with outcome Yes.
    pub fn prevalence(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        self.outcomes.iter().filter(|o| o.is_yes()).count() as f64 / self.len() as f64
    }

    /// New table with the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> SurveyTable {
        SurveyTable {
            ids: rows.iter().map(|&i| self.ids[i].clone()).collect(),
            outcomes: rows.iter().map(|&i| self.outcomes[i]).collect(),
            age: self
                .age
                .as_ref()
                .map(|a| rows.iter().map(|&i| a[i]).collect()),
            factors: self
                .factors
                .iter()
                .map(|(c, f)| (*c, f.select(rows)))
                .collect(),
            lines: rows.iter().map(|&i| self.lines[i]).collect(),
        }
    }

    /// Write the table as CSV with R-style headers and a 0/1 outcome.
    ///
    /// The output loads back through [`crate::data::load_csv`].
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let columns = self.columns();
        let csv_err = |e: csv::Error| Error::Io(std::io::Error::other(e.to_string()));

        wtr.write_record(columns.iter().map(|c| c.name()))
            .map_err(csv_err)?;
        for record in self.records() {
            let row: Vec<String> = columns
                .iter()
                .map(|c| match c {
                    Column::Id => record.id().to_string(),
                    Column::HairLoss => record.outcome().code().to_string(),
                    Column::Age => record.age().map(|a| a.to_string()).unwrap_or_default(),
                    other => record.factor(*other).unwrap_or_default().to_string(),
                })
                .collect();
            wtr.write_record(&row).map_err(csv_err)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
