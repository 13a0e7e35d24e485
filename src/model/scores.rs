use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Weighted sub-criterion scores of one indicator for one pressure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureSubScores {
    pub press: String,
    #[serde(default)]
    pub press_type: Option<String>,
    /// Keyed by sub-criterion code (`C9_1`, `C10_2`, ...).
    pub scores: BTreeMap<String, f64>,
}

impl PressureSubScores {
    pub fn is_significant(&self) -> bool {
        self.scores.values().any(|v| *v != 0.0)
    }

    pub fn get(&self, subcrit: &str) -> f64 {
        self.scores.get(subcrit).copied().unwrap_or(0.0)
    }
}

/// All scores of one indicator. Either group may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: usize,
    pub ind: String,
    /// Indicator-level criterion totals keyed by criterion code.
    #[serde(default)]
    pub general: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub pressures: Option<Vec<PressureSubScores>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionGroups {
    IndicatorOnly,
    PressureOnly,
    Both,
    Neither,
}

impl CriterionGroups {
    pub fn has_indicator(self) -> bool {
        matches!(self, CriterionGroups::IndicatorOnly | CriterionGroups::Both)
    }

    pub fn has_pressure(self) -> bool {
        matches!(self, CriterionGroups::PressureOnly | CriterionGroups::Both)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub records: Vec<ScoreRecord>,
}

impl ScoreTable {
    pub fn new(records: Vec<ScoreRecord>) -> Self {
        Self { records }
    }

    /// Which criterion groups the table carries. A group counts as present
    /// when at least one record holds it.
    pub fn groups(&self) -> CriterionGroups {
        let general = self.records.iter().any(|r| r.general.is_some());
        let pressure = self.records.iter().any(|r| r.pressures.is_some());
        match (general, pressure) {
            (true, true) => CriterionGroups::Both,
            (true, false) => CriterionGroups::IndicatorOnly,
            (false, true) => CriterionGroups::PressureOnly,
            (false, false) => CriterionGroups::Neither,
        }
    }
}
