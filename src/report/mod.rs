pub mod json;
pub mod tables;
pub mod text;

use serde::Serialize;

use crate::model::scores::CriterionGroups;
use crate::pipeline::FitFailure;

/// Run-level facts shared by the JSON and text summaries.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tool_name: String,
    pub tool_version: String,
    pub family: String,
    pub k: usize,
    pub train_fraction: f64,
    pub split: String,
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_indicators: usize,
    pub n_pressures: usize,
    pub trend_failures: Vec<FitFailure>,
    pub pressure_failures: Vec<FitFailure>,
    pub groups: CriterionGroups,
}

pub fn format_f64_6(v: f64) -> String {
    format!("{:.6}", v)
}

/// Missing values are written as `NA`.
pub fn format_opt(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => format_f64_6(v),
        Some(v) => v.to_string(),
        None => "NA".to_string(),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
