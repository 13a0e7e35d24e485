pub mod defs;
pub mod loader;

use std::collections::BTreeSet;

pub use defs::{CriterionKind, ScoringRule};

use crate::criteria::defs::builtin_criteria;
use crate::input::InputError;

#[derive(Debug, Clone, PartialEq)]
pub struct SubCriterion {
    pub code: String,
    /// Attainable scores, ascending. A score of zero is always allowed.
    pub levels: Vec<f64>,
    pub weight: f64,
    pub rule: ScoringRule,
}

impl SubCriterion {
    pub fn max_weighted(&self) -> f64 {
        self.levels.last().copied().unwrap_or(0.0) * self.weight
    }

    /// Weighted score of level `idx`; `None` scores zero.
    pub fn weighted(&self, idx: Option<usize>) -> f64 {
        idx.and_then(|i| self.levels.get(i))
            .map(|s| s * self.weight)
            .unwrap_or(0.0)
    }

    pub fn accepts(&self, score: f64) -> bool {
        score == 0.0 || self.levels.contains(&score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub code: String,
    pub name: String,
    pub kind: CriterionKind,
    pub subcriteria: Vec<SubCriterion>,
}

impl Criterion {
    /// Maximum attainable weighted score: the sum of the per-sub-criterion maxima.
    pub fn total_score(&self) -> f64 {
        self.subcriteria.iter().map(SubCriterion::max_weighted).sum()
    }

    pub fn is_expert(&self) -> bool {
        self.subcriteria.iter().all(|s| s.rule == ScoringRule::Expert)
    }
}

/// Ordered criteria rubric shared by the scorer and the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaTemplate {
    criteria: Vec<Criterion>,
}

impl CriteriaTemplate {
    pub fn builtin() -> Self {
        let criteria = builtin_criteria()
            .iter()
            .map(|def| Criterion {
                code: def.code.to_string(),
                name: def.name.to_string(),
                kind: def.kind,
                subcriteria: def
                    .subcriteria
                    .iter()
                    .map(|s| SubCriterion {
                        code: s.code.to_string(),
                        levels: s.levels.to_vec(),
                        weight: s.weight,
                        rule: s.rule,
                    })
                    .collect(),
            })
            .collect();
        Self { criteria }
    }

    pub fn new(criteria: Vec<Criterion>) -> Result<Self, InputError> {
        let template = Self { criteria };
        template.validate()?;
        Ok(template)
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn indicator_criteria(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria
            .iter()
            .filter(|c| c.kind == CriterionKind::Indicator)
    }

    pub fn pressure_criteria(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria
            .iter()
            .filter(|c| c.kind == CriterionKind::Pressure)
    }

    pub fn find(&self, code: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.code == code)
    }

    pub fn find_subcriterion(&self, code: &str) -> Option<(&Criterion, &SubCriterion)> {
        self.criteria.iter().find_map(|c| {
            c.subcriteria
                .iter()
                .find(|s| s.code == code)
                .map(|s| (c, s))
        })
    }

    fn validate(&self) -> Result<(), InputError> {
        if self.criteria.is_empty() {
            return Err(InputError::InvalidInput(
                "criteria template is empty".to_string(),
            ));
        }
        let mut crit_codes = BTreeSet::new();
        let mut sub_codes = BTreeSet::new();
        for c in &self.criteria {
            if !crit_codes.insert(c.code.as_str()) {
                return Err(template_error(format!("duplicate criterion '{}'", c.code)));
            }
            if c.subcriteria.is_empty() {
                return Err(template_error(format!(
                    "criterion '{}' has no sub-criteria",
                    c.code
                )));
            }
            for s in &c.subcriteria {
                if !sub_codes.insert(s.code.as_str()) {
                    return Err(template_error(format!(
                        "duplicate sub-criterion '{}'",
                        s.code
                    )));
                }
                if s.levels.is_empty()
                    || s.levels.iter().any(|l| !l.is_finite() || *l < 0.0)
                    || s.levels.windows(2).any(|w| w[1] <= w[0])
                {
                    return Err(template_error(format!(
                        "sub-criterion '{}' needs non-negative, strictly increasing scores",
                        s.code
                    )));
                }
                if !(s.weight.is_finite() && s.weight > 0.0) {
                    return Err(template_error(format!(
                        "sub-criterion '{}' has a non-positive weight",
                        s.code
                    )));
                }
                match s.rule.kind() {
                    Some(kind) if kind != c.kind => {
                        return Err(template_error(format!(
                            "rule of sub-criterion '{}' does not fit a {:?} criterion",
                            s.code, c.kind
                        )));
                    }
                    None if c.kind == CriterionKind::Pressure => {
                        return Err(template_error(format!(
                            "pressure-specific sub-criterion '{}' cannot be expert-scored",
                            s.code
                        )));
                    }
                    _ => {}
                }
            }
            if !(c.total_score() > 0.0) {
                return Err(template_error(format!(
                    "criterion '{}' has a zero maximum score",
                    c.code
                )));
            }
        }
        Ok(())
    }
}

fn template_error(msg: String) -> InputError {
    InputError::InvalidInput(format!("criteria template: {msg}"))
}

#[cfg(test)]
#[path = "../../tests/src_inline/criteria/tests.rs"]
mod tests;
