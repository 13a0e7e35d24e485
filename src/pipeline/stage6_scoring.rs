use std::collections::BTreeMap;

use crate::criteria::{CriteriaTemplate, CriterionKind, ScoringRule, SubCriterion};
use crate::input::{ExpertScore, InputError};
use crate::model::scores::{PressureSubScores, ScoreRecord, ScoreTable};
use crate::model::settings::ScoringProfile;
use crate::pipeline::stage1_init::NamedSeries;
use crate::pipeline::stage4_interaction::Stage4Output;
use crate::pipeline::stage5_diagnostics::ModelDiagnostics;

#[derive(Debug, Clone)]
pub struct Stage6Inputs<'a> {
    pub template: &'a CriteriaTemplate,
    pub profile: &'a ScoringProfile,
    pub indicators: &'a [NamedSeries],
    pub trend: &'a [ModelDiagnostics],
    /// Empty when no pressures were modeled.
    pub pressure: &'a [ModelDiagnostics],
    pub interactions: &'a Stage4Output,
    pub press_types: &'a BTreeMap<String, String>,
    pub expert: Option<&'a [ExpertScore]>,
}

/// Turns model diagnostics (and optional expert scores) into the flat score
/// table.
pub fn run_stage6(inputs: &Stage6Inputs<'_>) -> Result<ScoreTable, InputError> {
    let expert = match inputs.expert {
        Some(rows) => Some(index_expert_scores(inputs.template, inputs.indicators, rows)?),
        None => None,
    };
    let has_pressure_criteria = inputs.template.pressure_criteria().next().is_some();

    let mut records = Vec::with_capacity(inputs.indicators.len());
    for ind in inputs.indicators {
        let general = general_scores(inputs, ind, expert.as_ref());
        let pressures = if has_pressure_criteria && !inputs.pressure.is_empty() {
            Some(pressure_scores(inputs, ind))
        } else {
            None
        };
        records.push(ScoreRecord {
            id: ind.id,
            ind: ind.name.clone(),
            general,
            pressures,
        });
    }

    tracing::info!(indicators = records.len(), "criteria scored");
    Ok(ScoreTable::new(records))
}

type ExpertIndex = BTreeMap<(usize, String), f64>;

fn index_expert_scores(
    template: &CriteriaTemplate,
    indicators: &[NamedSeries],
    rows: &[ExpertScore],
) -> Result<ExpertIndex, InputError> {
    let mut out = BTreeMap::new();
    for row in rows {
        let ind = indicators
            .iter()
            .find(|s| s.name == row.ind || s.raw_name == row.ind)
            .ok_or_else(|| {
                InputError::InvalidInput(format!("expert scores name unknown indicator '{}'", row.ind))
            })?;
        let Some((crit, sub)) = template.find_subcriterion(&row.subcrit) else {
            return Err(InputError::InvalidInput(format!(
                "expert scores name unknown sub-criterion '{}'",
                row.subcrit
            )));
        };
        if crit.kind != CriterionKind::Indicator || sub.rule != ScoringRule::Expert {
            return Err(InputError::InvalidInput(format!(
                "sub-criterion '{}' is not expert-scored at indicator level",
                row.subcrit
            )));
        }
        if !sub.accepts(row.score) {
            return Err(InputError::InvalidInput(format!(
                "score {} is not a level of sub-criterion '{}'",
                row.score, row.subcrit
            )));
        }
        if out
            .insert((ind.id, row.subcrit.clone()), row.score * sub.weight)
            .is_some()
        {
            return Err(InputError::InvalidInput(format!(
                "indicator '{}' has two expert scores for '{}'",
                row.ind, row.subcrit
            )));
        }
    }
    Ok(out)
}

fn general_scores(
    inputs: &Stage6Inputs<'_>,
    ind: &NamedSeries,
    expert: Option<&ExpertIndex>,
) -> Option<BTreeMap<String, f64>> {
    let trend = inputs.trend.iter().find(|d| d.key.id == ind.id);
    let mut out = BTreeMap::new();
    for crit in inputs.template.indicator_criteria() {
        if crit.is_expert() && expert.is_none() {
            continue;
        }
        let total: f64 = crit
            .subcriteria
            .iter()
            .map(|sub| match sub.rule {
                ScoringRule::Expert => expert
                    .and_then(|e| e.get(&(ind.id, sub.code.clone())))
                    .copied()
                    .unwrap_or(0.0),
                _ => sub.weighted(level_for(sub, trend, None, inputs.profile)),
            })
            .sum();
        out.insert(crit.code.clone(), total);
    }
    if out.is_empty() { None } else { Some(out) }
}

fn pressure_scores(inputs: &Stage6Inputs<'_>, ind: &NamedSeries) -> Vec<PressureSubScores> {
    inputs
        .pressure
        .iter()
        .filter(|d| d.key.id == ind.id)
        .filter_map(|d| {
            let press = d.key.press.as_ref()?;
            let significant = d.p_val.is_some_and(|p| p <= inputs.profile.alpha);
            let interaction = inputs.interactions.interaction_for(ind.id, press);
            let mut scores = BTreeMap::new();
            for crit in inputs.template.pressure_criteria() {
                for sub in &crit.subcriteria {
                    let value = if significant {
                        sub.weighted(level_for(sub, Some(d), interaction, inputs.profile))
                    } else {
                        0.0
                    };
                    scores.insert(sub.code.clone(), value);
                }
            }
            Some(PressureSubScores {
                press: press.clone(),
                press_type: inputs.press_types.get(press).cloned(),
                scores,
            })
        })
        .collect()
}

/// Index into the sub-criterion's levels earned by a model, `None` for zero.
fn level_for(
    sub: &SubCriterion,
    diag: Option<&ModelDiagnostics>,
    interaction: Option<bool>,
    profile: &ScoringProfile,
) -> Option<usize> {
    let diag = diag?;
    let top = sub.levels.len().checked_sub(1)?;
    match sub.rule {
        ScoringRule::Expert => None,
        ScoringRule::TrendSignificant | ScoringRule::PressureSignificant => {
            diag.p_val.filter(|p| *p <= profile.alpha).map(|_| 0)
        }
        ScoringRule::ExplainedDeviance => {
            let e = diag.expl_dev?;
            let class = if e < profile.expl_dev_low {
                0
            } else if e <= profile.expl_dev_high {
                1
            } else {
                2
            };
            Some(class.min(top))
        }
        ScoringRule::ResidualDiagnostics => {
            let adequate = diag.tac == Some(false)
                && diag.ks_test.is_some_and(|p| p > profile.ks_alpha)
                && diag.max_cooks.is_some_and(|c| c <= profile.cooks_threshold);
            adequate.then_some(0)
        }
        ScoringRule::NoInteraction => (interaction == Some(false)).then_some(0),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage6_scoring.rs"]
mod tests;
