use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

pub mod names;
pub mod table;

use table::{open_maybe_gz, parse_cell};

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn from_values(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().map(|v| Some(*v)).collect())
    }
}

/// A rectangular table of numeric series sharing one time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable {
    pub time_col: String,
    pub time: Vec<f64>,
    pub series: Vec<Series>,
}

impl SeriesTable {
    pub fn new(
        time_col: impl Into<String>,
        time: Vec<f64>,
        series: Vec<Series>,
    ) -> Result<Self, InputError> {
        let table = Self {
            time_col: time_col.into(),
            time,
            series,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.time.len()
    }

    pub fn find(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }

    fn validate(&self) -> Result<(), InputError> {
        if self.time.is_empty() {
            return Err(InputError::InvalidInput(format!(
                "time column '{}' is empty",
                self.time_col
            )));
        }
        if self.series.is_empty() {
            return Err(InputError::InvalidInput(
                "table has no series besides the time column".to_string(),
            ));
        }
        if let Some(t) = self.time.iter().find(|t| !t.is_finite()) {
            return Err(InputError::InvalidInput(format!(
                "time column '{}' contains a non-finite value ({t})",
                self.time_col
            )));
        }
        if self.time.windows(2).any(|w| w[1] <= w[0]) {
            return Err(InputError::InvalidInput(format!(
                "time column '{}' must be strictly increasing",
                self.time_col
            )));
        }
        let mut seen = BTreeSet::new();
        for s in &self.series {
            if s.values.len() != self.time.len() {
                return Err(InputError::InvalidInput(format!(
                    "series '{}' has {} values but the time vector has {}",
                    s.name,
                    s.values.len(),
                    self.time.len()
                )));
            }
            if s.values.iter().flatten().any(|v| !v.is_finite()) {
                return Err(InputError::InvalidInput(format!(
                    "series '{}' contains a non-finite value",
                    s.name
                )));
            }
            if !seen.insert(s.name.as_str()) {
                return Err(InputError::InvalidInput(format!(
                    "duplicate series name '{}'",
                    s.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<csv::Error> for InputError {
    fn from(value: csv::Error) -> Self {
        InputError::Parse(value.to_string())
    }
}

impl From<serde_json::Error> for InputError {
    fn from(value: serde_json::Error) -> Self {
        InputError::Parse(value.to_string())
    }
}

/// Reads a CSV (optionally gzipped) whose first column is the time axis and
/// whose remaining columns are numeric series. Empty cells and `NA` are missing.
pub fn load_series_table(path: &Path) -> Result<SeriesTable, InputError> {
    if !path.exists() {
        return Err(InputError::MissingInput(path.display().to_string()));
    }
    let reader = open_maybe_gz(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(InputError::InvalidInput(format!(
            "{} needs a time column and at least one series column",
            path.display()
        )));
    }
    let time_col = headers[0].to_string();
    let names: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();

    let mut time = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];
    for (row_idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line_no = row_idx + 2;
        let t = parse_cell(&record[0])
            .map_err(|msg| InputError::Parse(format!("line {line_no}, column 1: {msg}")))?
            .ok_or_else(|| {
                InputError::InvalidInput(format!("line {line_no}: missing time value"))
            })?;
        time.push(t);
        for (col, cell) in record.iter().skip(1).enumerate() {
            let value = parse_cell(cell).map_err(|msg| {
                InputError::Parse(format!("line {line_no}, column {}: {msg}", col + 2))
            })?;
            columns[col].push(value);
        }
    }

    tracing::debug!(
        path = %path.display(),
        rows = time.len(),
        series = names.len(),
        "loaded series table"
    );

    let series = names
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name, values))
        .collect();
    SeriesTable::new(time_col, time, series)
}

#[derive(Debug, Clone, Deserialize)]
struct PressTypeRow {
    press: String,
    press_type: String,
}

/// Reads a two-column `press,press_type` CSV.
pub fn load_press_types(path: &Path) -> Result<BTreeMap<String, String>, InputError> {
    let reader = open_maybe_gz(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = BTreeMap::new();
    for row in rdr.deserialize() {
        let row: PressTypeRow = row?;
        if out.insert(row.press.clone(), row.press_type).is_some() {
            return Err(InputError::InvalidInput(format!(
                "pressure '{}' listed twice in {}",
                row.press,
                path.display()
            )));
        }
    }
    Ok(out)
}

/// One expert-judged sub-criterion score for an indicator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExpertScore {
    pub ind: String,
    pub subcrit: String,
    pub score: f64,
}

/// Reads an `ind,subcrit,score` CSV of expert-scored indicator-level criteria.
pub fn load_expert_scores(path: &Path) -> Result<Vec<ExpertScore>, InputError> {
    let reader = open_maybe_gz(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut out = Vec::new();
    for row in rdr.deserialize() {
        let row: ExpertScore = row?;
        out.push(row);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
