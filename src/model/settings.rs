use serde::{Deserialize, Serialize};

use crate::input::InputError;
use crate::model::family::Family;
use crate::model::nrmse::{BackTransform, NrmseMethod, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    Sequential,
    Random { seed: u64 },
}

/// How overview pressure scores are filled for an indicator without any
/// significant pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPressurePolicy {
    #[default]
    Zero,
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitSettings {
    pub train_fraction: f64,
    pub split: SplitMode,
    /// Basis dimension of every smooth term.
    pub k: usize,
    pub family: Family,
    pub nrmse_method: NrmseMethod,
    pub transform: Transform,
    pub back_transform: BackTransform,
}

impl FitSettings {
    pub fn default_v1() -> Self {
        Self {
            train_fraction: 0.9,
            split: SplitMode::Sequential,
            k: 4,
            family: Family::gaussian(),
            nrmse_method: NrmseMethod::Sd,
            transform: Transform::None,
            back_transform: BackTransform::None,
        }
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if !(0.0..=1.0).contains(&self.train_fraction) {
            return Err(InputError::InvalidInput(format!(
                "train fraction must be within [0, 1], got {}",
                self.train_fraction
            )));
        }
        if self.k < 4 {
            return Err(InputError::InvalidInput(format!(
                "basis dimension k must be at least 4, got {}",
                self.k
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionSettings {
    pub enabled: bool,
    pub quantile_lo: f64,
    pub quantile_hi: f64,
    pub n_thresholds: usize,
    /// Each regime must keep at least this share of the observations.
    pub min_regime_fraction: f64,
}

impl InteractionSettings {
    pub fn default_v1() -> Self {
        Self {
            enabled: true,
            quantile_lo: 0.2,
            quantile_hi: 0.8,
            n_thresholds: 7,
            min_regime_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringProfile {
    pub alpha: f64,
    pub expl_dev_low: f64,
    pub expl_dev_high: f64,
    pub ks_alpha: f64,
    pub cooks_threshold: f64,
    pub missing_pressure: MissingPressurePolicy,
}

impl ScoringProfile {
    pub fn default_v1() -> Self {
        Self {
            alpha: 0.05,
            expl_dev_low: 0.25,
            expl_dev_high: 0.75,
            ks_alpha: 0.05,
            cooks_threshold: 1.0,
            missing_pressure: MissingPressurePolicy::Zero,
        }
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(InputError::InvalidInput(format!(
                "significance level must be within (0, 1), got {}",
                self.alpha
            )));
        }
        if !(self.expl_dev_low < self.expl_dev_high) {
            return Err(InputError::InvalidInput(
                "explained deviance class bounds must be increasing".to_string(),
            ));
        }
        Ok(())
    }
}
