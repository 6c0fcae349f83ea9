//! Cleaning: raw table to typed survey table.
//!
//! Three pure steps, each returning a new value:
//! 1. [`drop_unusable_rows`]: list-wise deletion of rows holding the sentinel
//!    or a missing cell
//! 2. [`coerce`]: header resolution and typed columns
//! 3. [`resolve_duplicates`]: one row per identifier
//!
//! Rows are dropped, never imputed. Every dropped row is reported as a
//! [`DataQualityIssue`].
//!
//! Categorical values match levels ignoring ASCII case, whether the levels
//! are configured or taken from the data.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use hlb_common::{Error, Result};
use hlb_config::{CleaningConfig, DuplicatePolicy};

use super::schema::{Column, ColumnKind};
use super::survey::{Factor, Outcome, SurveyTable};
use super::table::{is_missing, RawTable};

/// Options for [`clean`].
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningOptions {
    pub sentinel: String,
    pub duplicates: DuplicatePolicy,
    /// Level order overrides per categorical column.
    pub level_orders: BTreeMap<Column, Vec<String>>,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        CleaningOptions {
            sentinel: "No Data".to_string(),
            duplicates: DuplicatePolicy::KeepFirst,
            level_orders: BTreeMap::new(),
        }
    }
}

impl CleaningOptions {
    /// Resolve configured column names.
    pub fn from_config(cfg: &CleaningConfig) -> Result<Self> {
        let mut level_orders = BTreeMap::new();
        for (name, levels) in &cfg.level_orders {
            let field = format!("cleaning.level_orders.{}", name);
            let column = Column::from_header(name).ok_or_else(|| Error::InvalidConfig {
                field: field.clone(),
                message: format!("'{}' is not a survey column", name),
            })?;
            if matches!(
                column.kind(),
                ColumnKind::Identifier | ColumnKind::Numeric | ColumnKind::Outcome
            ) {
                return Err(Error::InvalidConfig {
                    field,
                    message: format!("{} is not a categorical column", column),
                });
            }
            let levels = levels.iter().map(|l| l.trim().to_string()).collect();
            level_orders.insert(column, levels);
        }
        Ok(CleaningOptions {
            sentinel: cfg.sentinel.trim().to_string(),
            duplicates: cfg.duplicates.clone(),
            level_orders,
        })
    }
}

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// A cell held the sentinel value.
    Sentinel { column: String },
    /// A cell was empty or NA.
    MissingValue { column: String },
    /// Another row with the same identifier was kept.
    DuplicateId { kept_line: u64 },
    /// Every row of this duplicated identifier was dropped.
    DuplicateDropped,
    /// The identifier was listed for removal.
    ListedId,
}

/// One dropped row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DataQualityIssue {
    /// 1-based line in the input file.
    pub line: u64,
    pub id: Option<String>,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl std::fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.id.as_deref().unwrap_or("?");
        match &self.kind {
            IssueKind::Sentinel { column } => {
                write!(f, "line {} (id {}): sentinel in {}", self.line, id, column)
            }
            IssueKind::MissingValue { column } => {
                write!(f, "line {} (id {}): missing {}", self.line, id, column)
            }
            IssueKind::DuplicateId { kept_line } => write!(
                f,
                "line {} (id {}): duplicate of line {}",
                self.line, id, kept_line
            ),
            IssueKind::DuplicateDropped => {
                write!(f, "line {} (id {}): duplicated identifier dropped", self.line, id)
            }
            IssueKind::ListedId => {
                write!(f, "line {} (id {}): identifier listed for removal", self.line, id)
            }
        }
    }
}

/// Row accounting of a cleaning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CleaningReport {
    pub rows_in: usize,
    pub dropped_sentinel: usize,
    pub dropped_missing: usize,
    pub dropped_duplicates: usize,
    pub rows_out: usize,
    /// Identifiers that appeared more than once after row deletion.
    pub duplicate_ids: Vec<String>,
    /// Headers that match no survey column.
    pub ignored_columns: Vec<String>,
}

/// Result of [`clean`].
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub table: SurveyTable,
    pub issues: Vec<DataQualityIssue>,
    pub report: CleaningReport,
}

/// Run all cleaning steps.
pub fn clean(raw: &RawTable, options: &CleaningOptions) -> Result<CleanOutcome> {
    let (usable, mut issues) = drop_unusable_rows(raw, &options.sentinel);
    let typed = coerce(&usable, options)?;
    let duplicates = resolve_duplicates(&typed, &options.duplicates);

    let dropped_sentinel = issues
        .iter()
        .filter(|i| matches!(i.kind, IssueKind::Sentinel { .. }))
        .count();
    let report = CleaningReport {
        rows_in: raw.n_rows(),
        dropped_sentinel,
        dropped_missing: issues.len() - dropped_sentinel,
        dropped_duplicates: duplicates.issues.len(),
        rows_out: duplicates.table.len(),
        duplicate_ids: duplicates.duplicate_ids,
        ignored_columns: unrecognized_headers(raw),
    };
    issues.extend(duplicates.issues);

    Ok(CleanOutcome {
        table: duplicates.table,
        issues,
        report,
    })
}

/// Remove every row holding the sentinel or a missing cell in any column.
pub fn drop_unusable_rows(raw: &RawTable, sentinel: &str) -> (RawTable, Vec<DataQualityIssue>) {
    let sentinel = sentinel.trim();
    let id_index = raw
        .headers
        .iter()
        .position(|h| Column::from_header(h) == Some(Column::Id));
    let mut issues = Vec::new();

    let kept = raw.filter_rows(|row| {
        let problem = row.cells.iter().enumerate().find_map(|(i, cell)| {
            let column = raw.headers.get(i).map(|h| h.trim().to_string()).unwrap_or_default();
            if cell.trim().eq_ignore_ascii_case(sentinel) {
                Some(IssueKind::Sentinel { column })
            } else if is_missing(cell) {
                Some(IssueKind::MissingValue { column })
            } else {
                None
            }
        });
        match problem {
            None => true,
            Some(kind) => {
                issues.push(DataQualityIssue {
                    line: row.line,
                    id: id_index
                        .and_then(|i| row.cells.get(i))
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty()),
                    kind,
                });
                false
            }
        }
    });

    (kept, issues)
}

/// Headers that do not resolve to a survey column.
pub fn unrecognized_headers(raw: &RawTable) -> Vec<String> {
    raw.headers
        .iter()
        .filter(|h| Column::from_header(h).is_none())
        .map(|h| h.trim().to_string())
        .collect()
}

/// Cast raw cells to typed columns.
///
/// The identifier and outcome columns are required. Factor cells are
/// matched to levels trimmed and case-insensitively; Age must parse as a
/// finite number; the outcome must be 0/1.
pub fn coerce(raw: &RawTable, options: &CleaningOptions) -> Result<SurveyTable> {
    let mut index: BTreeMap<Column, usize> = BTreeMap::new();
    for (i, header) in raw.headers.iter().enumerate() {
        if let Some(column) = Column::from_header(header) {
            if let Some(&prev) = index.get(&column) {
                return Err(Error::Schema(format!(
                    "headers '{}' and '{}' both name column {}",
                    raw.headers[prev].trim(),
                    header.trim(),
                    column
                )));
            }
            index.insert(column, i);
        }
    }

    let required = |column: Column| {
        index.get(&column).copied().ok_or_else(|| Error::MissingColumn {
            column: column.name().to_string(),
        })
    };
    let id_col = required(Column::Id)?;
    let outcome_col = required(Column::HairLoss)?;

    let cell = |row: usize, col: usize| raw.rows[row].cells[col].trim();

    let mut ids = Vec::with_capacity(raw.n_rows());
    let mut outcomes = Vec::with_capacity(raw.n_rows());
    for r in 0..raw.n_rows() {
        ids.push(cell(r, id_col).to_string());
        let value = cell(r, outcome_col);
        let outcome = Outcome::parse(value).ok_or_else(|| {
            Error::Schema(format!(
                "line {}: {} value '{}' is not 0 or 1",
                raw.rows[r].line,
                Column::HairLoss,
                value
            ))
        })?;
        outcomes.push(outcome);
    }

    let age = match index.get(&Column::Age) {
        None => None,
        Some(&col) => {
            let mut values = Vec::with_capacity(raw.n_rows());
            for r in 0..raw.n_rows() {
                let value = cell(r, col);
                let age = value
                    .parse::<f64>()
                    .ok()
                    .filter(|a| a.is_finite())
                    .ok_or_else(|| {
                        Error::Schema(format!(
                            "line {}: Age value '{}' is not a number",
                            raw.rows[r].line, value
                        ))
                    })?;
                values.push(age);
            }
            Some(values)
        }
    };

    let mut factors = BTreeMap::new();
    for &column in Column::RISK_FACTORS {
        let Some(&col) = index.get(&column) else {
            continue;
        };
        let cells: Vec<(u64, &str)> = (0..raw.n_rows())
            .map(|r| (raw.rows[r].line, cell(r, col)))
            .collect();
        let factor = match explicit_levels(column, options) {
            Some(levels) => factor_with_levels(column, &cells, levels)?,
            None => factor_from_observed(&cells),
        };
        factors.insert(column, factor);
    }

    Ok(SurveyTable {
        ids,
        outcomes,
        age,
        factors,
        lines: raw.rows.iter().map(|r| r.line).collect(),
    })
}

fn explicit_levels(column: Column, options: &CleaningOptions) -> Option<Vec<String>> {
    options.level_orders.get(&column).cloned().or_else(|| {
        column
            .default_levels()
            .map(|l| l.iter().map(|s| s.to_string()).collect())
    })
}

fn factor_with_levels(column: Column, cells: &[(u64, &str)], levels: Vec<String>) -> Result<Factor> {
    let mut codes = Vec::with_capacity(cells.len());
    for (line, value) in cells {
        let code = levels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                Error::Schema(format!(
                    "line {}: unexpected {} level '{}' (expected {})",
                    line,
                    column,
                    value,
                    levels.join(", ")
                ))
            })?;
        codes.push(code);
    }
    Ok(Factor { levels, codes })
}

/// Levels from the data: spellings that differ only in ASCII case are one
/// level, named by its first spelling, sorted case-insensitively.
fn factor_from_observed(cells: &[(u64, &str)]) -> Factor {
    let mut spelling: BTreeMap<String, &str> = BTreeMap::new();
    for (_, v) in cells {
        spelling.entry(v.to_ascii_lowercase()).or_insert(v);
    }
    let lookup: HashMap<&str, usize> = spelling
        .keys()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();
    let codes = cells
        .iter()
        .map(|(_, v)| lookup[v.to_ascii_lowercase().as_str()])
        .collect();
    let levels = spelling.values().map(|v| v.to_string()).collect();
    Factor { levels, codes }
}

/// Result of [`resolve_duplicates`].
#[derive(Debug, Clone)]
pub struct DuplicateResolution {
    pub table: SurveyTable,
    pub issues: Vec<DataQualityIssue>,
    /// Identifiers that appeared more than once.
    pub duplicate_ids: Vec<String>,
}

/// Apply the duplicate policy so that every identifier appears once.
pub fn resolve_duplicates(table: &SurveyTable, policy: &DuplicatePolicy) -> DuplicateResolution {
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    for (i, id) in table.ids.iter().enumerate() {
        match position.get(id.as_str()) {
            Some(&g) => groups[g].1.push(i),
            None => {
                position.insert(id, groups.len());
                groups.push((id, vec![i]));
            }
        }
    }
    let duplicate_ids: Vec<String> = groups
        .iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(id, _)| id.to_string())
        .collect();

    let listed: HashSet<&str> = match policy {
        DuplicatePolicy::DropListed { ids } => ids.iter().map(|s| s.trim()).collect(),
        _ => HashSet::new(),
    };

    let mut keep = Vec::with_capacity(table.len());
    let mut issues = Vec::new();
    let issue = |row: usize, kind: IssueKind| DataQualityIssue {
        line: table.lines[row],
        id: Some(table.ids[row].clone()),
        kind,
    };

    for (id, rows) in &groups {
        if listed.contains(id) {
            issues.extend(rows.iter().map(|&r| issue(r, IssueKind::ListedId)));
            continue;
        }
        if rows.len() > 1 && matches!(policy, DuplicatePolicy::DropAll) {
            issues.extend(rows.iter().map(|&r| issue(r, IssueKind::DuplicateDropped)));
            continue;
        }
        let first = rows[0];
        keep.push(first);
        let kept_line = table.lines[first];
        issues.extend(
            rows[1..]
                .iter()
                .map(|&r| issue(r, IssueKind::DuplicateId { kept_line })),
        );
    }

    keep.sort_unstable();
    issues.sort_by_key(|i| i.line);
    DuplicateResolution {
        table: table.select_rows(&keep),
        issues,
        duplicate_ids,
    }
}
