use std::path::Path;

use serde::Deserialize;

use crate::criteria::{CriteriaTemplate, Criterion, CriterionKind, ScoringRule, SubCriterion};
use crate::input::InputError;
use crate::input::table::open_maybe_gz;

/// One row of a flat template file: a single attainable score of one
/// sub-criterion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateEntry {
    pub crit: String,
    #[serde(default)]
    pub crit_name: Option<String>,
    pub kind: CriterionKind,
    pub subcrit: String,
    pub score: f64,
    pub weight: f64,
    #[serde(default)]
    pub rule: ScoringRule,
}

pub fn load_template(path: &Path) -> Result<CriteriaTemplate, InputError> {
    let reader = open_maybe_gz(path)?;
    let entries: Vec<TemplateEntry> = serde_json::from_reader(reader)?;
    let template = template_from_entries(&entries)?;
    tracing::debug!(
        path = %path.display(),
        criteria = template.criteria().len(),
        "loaded criteria template"
    );
    Ok(template)
}

/// Groups flat entries into criteria, keeping first-appearance order.
pub fn template_from_entries(entries: &[TemplateEntry]) -> Result<CriteriaTemplate, InputError> {
    let mut criteria: Vec<Criterion> = Vec::new();
    for e in entries {
        let pos = match criteria.iter().position(|c| c.code == e.crit) {
            Some(pos) => {
                if criteria[pos].kind != e.kind {
                    return Err(InputError::InvalidInput(format!(
                        "criteria template: criterion '{}' listed with two kinds",
                        e.crit
                    )));
                }
                pos
            }
            None => {
                criteria.push(Criterion {
                    code: e.crit.clone(),
                    name: e.crit_name.clone().unwrap_or_else(|| e.crit.clone()),
                    kind: e.kind,
                    subcriteria: Vec::new(),
                });
                criteria.len() - 1
            }
        };
        let crit = &mut criteria[pos];
        let sub_pos = match crit.subcriteria.iter().position(|s| s.code == e.subcrit) {
            Some(i) => {
                let sub = &crit.subcriteria[i];
                if sub.weight != e.weight || sub.rule != e.rule {
                    return Err(InputError::InvalidInput(format!(
                        "criteria template: sub-criterion '{}' has conflicting weight or rule",
                        e.subcrit
                    )));
                }
                i
            }
            None => {
                crit.subcriteria.push(SubCriterion {
                    code: e.subcrit.clone(),
                    levels: Vec::new(),
                    weight: e.weight,
                    rule: e.rule,
                });
                crit.subcriteria.len() - 1
            }
        };
        let sub = &mut crit.subcriteria[sub_pos];
        if e.score != 0.0 && !sub.levels.contains(&e.score) {
            sub.levels.push(e.score);
        }
    }
    for c in &mut criteria {
        for s in &mut c.subcriteria {
            s.levels.sort_by(|a, b| a.total_cmp(b));
        }
    }
    CriteriaTemplate::new(criteria)
}
