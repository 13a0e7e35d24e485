use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::criteria::{CriteriaTemplate, Criterion, CriterionKind};
use crate::input::InputError;
use crate::model::scores::{CriterionGroups, PressureSubScores, ScoreRecord, ScoreTable};
use crate::model::settings::MissingPressurePolicy;
use crate::model::stats::round_half_even;

/// One row per indicator. `scores` and `percent` follow `Overview::criteria`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewRow {
    pub id: usize,
    pub ind: String,
    /// Present only when pressure-specific criteria were scored.
    pub nr_sign_press: Option<usize>,
    pub scores: Vec<Option<f64>>,
    pub percent: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    /// Criterion codes in template order, present columns only.
    pub criteria: Vec<String>,
    pub rows: Vec<OverviewRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub id: usize,
    pub ind: String,
    pub press: String,
    pub press_type: Option<String>,
    /// Follows `PressureBreakdown::subcriteria`.
    pub subscores: Vec<f64>,
    /// Follows `PressureBreakdown::criteria`.
    pub sums: Vec<f64>,
    pub percent: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PressureBreakdown {
    pub subcriteria: Vec<String>,
    pub criteria: Vec<String>,
    pub rows: Vec<BreakdownRow>,
}

/// Indicators by column; row keys are indicator names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreMatrix {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryViews {
    pub groups: CriterionGroups,
    pub overview: Overview,
    pub breakdown: Option<PressureBreakdown>,
    pub matrix: ScoreMatrix,
}

#[derive(Debug, Clone)]
pub struct Stage7Inputs<'a> {
    pub scores: &'a ScoreTable,
    pub template: &'a CriteriaTemplate,
    pub missing_pressure: MissingPressurePolicy,
}

pub fn percent_of_max(score: f64, total: f64) -> f64 {
    round_half_even(score / total * 100.0)
}

/// Reshapes the flat score table into the overview, breakdown and matrix
/// views. Dispatches on which criterion groups the table carries.
pub fn run_stage7(inputs: &Stage7Inputs<'_>) -> Result<SummaryViews, InputError> {
    let table = inputs.scores;
    check_scores(table, inputs.template)?;
    let groups = table.groups();

    let general = if groups.has_indicator() {
        present_indicator_criteria(table, inputs.template)
    } else {
        Vec::new()
    };
    let pressure = if groups.has_pressure() {
        present_pressure_criteria(table, inputs.template)
    } else {
        Vec::new()
    };

    let views = match groups {
        CriterionGroups::Neither => SummaryViews {
            groups,
            overview: Overview::default(),
            breakdown: None,
            matrix: ScoreMatrix::default(),
        },
        CriterionGroups::IndicatorOnly => SummaryViews {
            groups,
            overview: overview(table, inputs.template, &general, &[], inputs.missing_pressure),
            breakdown: None,
            matrix: score_matrix(table, &general, &[]),
        },
        CriterionGroups::PressureOnly | CriterionGroups::Both => SummaryViews {
            groups,
            overview: overview(table, inputs.template, &general, &pressure, inputs.missing_pressure),
            breakdown: Some(breakdown(table, &pressure)),
            matrix: score_matrix(table, &general, &pressure),
        },
    };

    tracing::info!(
        groups = ?groups,
        indicators = views.overview.rows.len(),
        matrix_columns = views.matrix.columns.len(),
        "summary views built"
    );
    Ok(views)
}

/// Rejects tables the views cannot represent consistently: unknown codes,
/// codes of the wrong group, scores outside `[0, max]`, and a pressure
/// listed twice for one indicator.
fn check_scores(table: &ScoreTable, template: &CriteriaTemplate) -> Result<(), InputError> {
    for r in &table.records {
        for (code, value) in r.general.iter().flatten() {
            let crit = template.find(code).ok_or_else(|| {
                InputError::InvalidInput(format!(
                    "indicator '{}' has a score for unknown criterion '{code}'",
                    r.ind
                ))
            })?;
            if crit.kind != CriterionKind::Indicator {
                return Err(InputError::InvalidInput(format!(
                    "indicator '{}' lists pressure criterion '{code}' among its general scores",
                    r.ind
                )));
            }
            check_range(&r.ind, code, *value, crit.total_score())?;
        }
        let mut seen = BTreeSet::new();
        for p in r.pressures.iter().flatten() {
            if !seen.insert(p.press.as_str()) {
                return Err(InputError::InvalidInput(format!(
                    "indicator '{}' lists pressure '{}' more than once",
                    r.ind, p.press
                )));
            }
            for (code, value) in &p.scores {
                let (crit, sub) = template.find_subcriterion(code).ok_or_else(|| {
                    InputError::InvalidInput(format!(
                        "indicator '{}' has a score for unknown sub-criterion '{code}'",
                        r.ind
                    ))
                })?;
                if crit.kind != CriterionKind::Pressure {
                    return Err(InputError::InvalidInput(format!(
                        "indicator '{}' lists indicator-level sub-criterion '{code}' under pressure '{}'",
                        r.ind, p.press
                    )));
                }
                check_range(&r.ind, code, *value, sub.max_weighted())?;
            }
        }
    }
    Ok(())
}

fn check_range(ind: &str, code: &str, value: f64, max: f64) -> Result<(), InputError> {
    let tolerance = 1e-9 * max.max(1.0);
    if !(0.0..=max + tolerance).contains(&value) {
        return Err(InputError::InvalidInput(format!(
            "indicator '{ind}': score {value} for '{code}' is outside [0, {max}]"
        )));
    }
    Ok(())
}

fn present_indicator_criteria<'t>(
    table: &ScoreTable,
    template: &'t CriteriaTemplate,
) -> Vec<&'t Criterion> {
    let present: BTreeSet<&str> = table
        .records
        .iter()
        .flat_map(|r| r.general.iter().flat_map(|g| g.keys()))
        .map(String::as_str)
        .collect();
    template
        .indicator_criteria()
        .filter(|c| present.contains(c.code.as_str()))
        .collect()
}

fn present_pressure_criteria<'t>(
    table: &ScoreTable,
    template: &'t CriteriaTemplate,
) -> Vec<&'t Criterion> {
    let present: BTreeSet<&str> = table
        .records
        .iter()
        .flat_map(|r| r.pressures.iter().flatten())
        .flat_map(|p| p.scores.keys())
        .map(String::as_str)
        .collect();
    template
        .pressure_criteria()
        .filter(|c| c.subcriteria.iter().any(|s| present.contains(s.code.as_str())))
        .collect()
}

fn criterion_sum(p: &PressureSubScores, crit: &Criterion) -> f64 {
    crit.subcriteria.iter().map(|s| p.get(&s.code)).sum()
}

fn significant(record: &ScoreRecord) -> Vec<&PressureSubScores> {
    record
        .pressures
        .iter()
        .flatten()
        .filter(|p| p.is_significant())
        .collect()
}

fn overview(
    table: &ScoreTable,
    template: &CriteriaTemplate,
    general: &[&Criterion],
    pressure: &[&Criterion],
    policy: MissingPressurePolicy,
) -> Overview {
    let with_pressure = table.groups().has_pressure();
    let criteria: Vec<&Criterion> = template
        .criteria()
        .iter()
        .filter(|c| general.iter().chain(pressure.iter()).any(|x| x.code == c.code))
        .collect();

    let rows = table
        .records
        .iter()
        .map(|r| {
            let retained = significant(r);
            let distinct: BTreeSet<&str> = retained.iter().map(|p| p.press.as_str()).collect();
            let scores: Vec<Option<f64>> = criteria
                .iter()
                .map(|c| {
                    if pressure.iter().any(|p| p.code == c.code) {
                        if retained.is_empty() {
                            match policy {
                                MissingPressurePolicy::Zero => Some(0.0),
                                MissingPressurePolicy::Missing => None,
                            }
                        } else {
                            let sum: f64 = retained.iter().map(|p| criterion_sum(p, c)).sum();
                            Some(sum / retained.len() as f64)
                        }
                    } else {
                        r.general.as_ref().and_then(|g| g.get(&c.code)).copied()
                    }
                })
                .collect();
            let percent = criteria
                .iter()
                .zip(scores.iter())
                .map(|(c, s)| s.map(|v| percent_of_max(v, c.total_score())))
                .collect();
            OverviewRow {
                id: r.id,
                ind: r.ind.clone(),
                nr_sign_press: with_pressure.then_some(distinct.len()),
                scores,
                percent,
            }
        })
        .collect();

    Overview {
        criteria: criteria.iter().map(|c| c.code.clone()).collect(),
        rows,
    }
}

fn breakdown(table: &ScoreTable, pressure: &[&Criterion]) -> PressureBreakdown {
    let subcriteria: Vec<String> = pressure
        .iter()
        .flat_map(|c| c.subcriteria.iter().map(|s| s.code.clone()))
        .collect();
    let rows = table
        .records
        .iter()
        .flat_map(|r| {
            r.pressures.iter().flatten().map(move |p| {
                let sums: Vec<f64> = pressure.iter().map(|c| criterion_sum(p, c)).collect();
                BreakdownRow {
                    id: r.id,
                    ind: r.ind.clone(),
                    press: p.press.clone(),
                    press_type: p.press_type.clone(),
                    subscores: pressure
                        .iter()
                        .flat_map(|c| c.subcriteria.iter().map(|s| p.get(&s.code)))
                        .collect(),
                    percent: pressure
                        .iter()
                        .zip(sums.iter())
                        .map(|(c, s)| percent_of_max(*s, c.total_score()))
                        .collect(),
                    sums,
                }
            })
        })
        .collect();
    PressureBreakdown {
        subcriteria,
        criteria: pressure.iter().map(|c| c.code.clone()).collect(),
        rows,
    }
}

fn score_matrix(table: &ScoreTable, general: &[&Criterion], pressure: &[&Criterion]) -> ScoreMatrix {
    let mut press_order: Vec<&str> = Vec::new();
    for p in table.records.iter().flat_map(|r| r.pressures.iter().flatten()) {
        if !press_order.contains(&p.press.as_str()) {
            press_order.push(p.press.as_str());
        }
    }

    let mut columns: Vec<String> = general.iter().map(|c| c.code.clone()).collect();
    for press in &press_order {
        for c in pressure {
            columns.push(format!("{press}_{}", c.code));
        }
    }

    let values = table
        .records
        .iter()
        .map(|r| {
            let mut row: Vec<Option<f64>> = general
                .iter()
                .map(|c| r.general.as_ref().and_then(|g| g.get(&c.code)).copied())
                .collect();
            let by_press: BTreeMap<&str, &PressureSubScores> = r
                .pressures
                .iter()
                .flatten()
                .map(|p| (p.press.as_str(), p))
                .collect();
            for press in &press_order {
                for c in pressure {
                    let v = by_press.get(press).map_or(0.0, |p| criterion_sum(p, c));
                    row.push(Some(v));
                }
            }
            row
        })
        .collect();

    ScoreMatrix {
        rows: table.records.iter().map(|r| r.ind.clone()).collect(),
        columns,
        values,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage7_summary.rs"]
mod tests;
