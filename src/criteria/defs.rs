use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    /// Scored once per indicator.
    Indicator,
    /// Scored per (indicator, pressure) pair.
    Pressure,
}

/// How a sub-criterion level is derived. `Expert` levels come from an
/// external score sheet; every other rule reads model diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringRule {
    #[default]
    Expert,
    TrendSignificant,
    PressureSignificant,
    ExplainedDeviance,
    ResidualDiagnostics,
    NoInteraction,
}

impl ScoringRule {
    pub fn kind(self) -> Option<CriterionKind> {
        match self {
            ScoringRule::Expert => None,
            ScoringRule::TrendSignificant => Some(CriterionKind::Indicator),
            ScoringRule::PressureSignificant
            | ScoringRule::ExplainedDeviance
            | ScoringRule::ResidualDiagnostics
            | ScoringRule::NoInteraction => Some(CriterionKind::Pressure),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubCriterionDef {
    pub code: &'static str,
    /// Attainable scores in ascending order; zero is always implied.
    pub levels: &'static [f64],
    pub weight: f64,
    pub rule: ScoringRule,
}

#[derive(Debug, Clone, Copy)]
pub struct CriterionDef {
    pub code: &'static str,
    pub name: &'static str,
    pub kind: CriterionKind,
    pub subcriteria: &'static [SubCriterionDef],
}

const TREND: &[SubCriterionDef] = &[SubCriterionDef {
    code: "C8_1",
    levels: &[1.0],
    weight: 1.0,
    rule: ScoringRule::TrendSignificant,
}];

const SENSITIVITY: &[SubCriterionDef] = &[
    SubCriterionDef {
        code: "C9_1",
        levels: &[1.0],
        weight: 1.0,
        rule: ScoringRule::PressureSignificant,
    },
    SubCriterionDef {
        code: "C9_2",
        levels: &[1.0, 2.0, 3.0],
        weight: 0.5,
        rule: ScoringRule::ExplainedDeviance,
    },
];

const ROBUSTNESS: &[SubCriterionDef] = &[
    SubCriterionDef {
        code: "C10_1",
        levels: &[1.0],
        weight: 1.0,
        rule: ScoringRule::ResidualDiagnostics,
    },
    SubCriterionDef {
        code: "C10_2",
        levels: &[1.0],
        weight: 1.0,
        rule: ScoringRule::NoInteraction,
    },
];

const MANAGEMENT: &[SubCriterionDef] = &[SubCriterionDef {
    code: "C11_1",
    levels: &[1.0, 2.0],
    weight: 1.0,
    rule: ScoringRule::Expert,
}];

const BUILTIN_CRITERIA: &[CriterionDef] = &[
    CriterionDef {
        code: "C8",
        name: "Trend",
        kind: CriterionKind::Indicator,
        subcriteria: TREND,
    },
    CriterionDef {
        code: "C9",
        name: "Sensitivity",
        kind: CriterionKind::Pressure,
        subcriteria: SENSITIVITY,
    },
    CriterionDef {
        code: "C10",
        name: "Robustness",
        kind: CriterionKind::Pressure,
        subcriteria: ROBUSTNESS,
    },
    CriterionDef {
        code: "C11",
        name: "Management linkage",
        kind: CriterionKind::Indicator,
        subcriteria: MANAGEMENT,
    },
];

pub fn builtin_criteria() -> &'static [CriterionDef] {
    BUILTIN_CRITERIA
}
