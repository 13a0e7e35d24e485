use serde::{Deserialize, Serialize};

use crate::model::stats::{mean, quantile_type7, sample_sd};

/// Scale statistic of the observations used to normalize the RMSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NrmseMethod {
    Range,
    Mean,
    #[default]
    Sd,
    Iq,
}

/// Transform applied to the response before modeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    #[default]
    None,
    Sqrt,
    FourthRoot,
    Log,
    Log10,
    Log1p,
}

/// Which series are mapped back to the original scale before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackTransform {
    #[default]
    None,
    Observed,
    Predicted,
    Both,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NrmseError {
    #[error("observed has {obs} values, predicted has {pred}")]
    LengthMismatch { obs: usize, pred: usize },
    #[error("no complete observed/predicted pairs")]
    NoCompletePairs,
    #[error("normalization denominator ({0}) is zero")]
    ZeroDenominator(&'static str),
    #[error("normalization denominator ({method}) is undefined for {n_pairs} pair(s)")]
    Undefined { method: &'static str, n_pairs: usize },
    #[error("non-finite value after back-transformation")]
    NonFinite,
}

impl NrmseMethod {
    pub fn name(self) -> &'static str {
        match self {
            NrmseMethod::Range => "range",
            NrmseMethod::Mean => "mean",
            NrmseMethod::Sd => "sd",
            NrmseMethod::Iq => "iq",
        }
    }

    fn denominator(self, obs: &[f64]) -> Result<f64, NrmseError> {
        let value = match self {
            NrmseMethod::Range => {
                let lo = obs.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = obs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                hi - lo
            }
            NrmseMethod::Mean => mean(obs),
            NrmseMethod::Sd => sample_sd(obs).ok_or(NrmseError::Undefined {
                method: self.name(),
                n_pairs: obs.len(),
            })?,
            NrmseMethod::Iq => quantile_type7(obs, 0.75) - quantile_type7(obs, 0.25),
        };
        if value == 0.0 || !value.is_finite() {
            return Err(NrmseError::ZeroDenominator(self.name()));
        }
        Ok(value)
    }
}

impl Transform {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Transform::None => x,
            Transform::Sqrt => x.sqrt(),
            Transform::FourthRoot => x.powf(0.25),
            Transform::Log => x.ln(),
            Transform::Log10 => x.log10(),
            Transform::Log1p => x.ln_1p(),
        }
    }

    pub fn invert(self, x: f64) -> f64 {
        match self {
            Transform::None => x,
            Transform::Sqrt => x * x,
            Transform::FourthRoot => x.powi(4),
            Transform::Log => x.exp(),
            Transform::Log10 => 10f64.powf(x),
            Transform::Log1p => x.exp_m1(),
        }
    }
}

impl BackTransform {
    fn observed(self) -> bool {
        matches!(self, BackTransform::Observed | BackTransform::Both)
    }

    fn predicted(self) -> bool {
        matches!(self, BackTransform::Predicted | BackTransform::Both)
    }
}

/// RMSE of `pred` against `obs`, divided by a scale statistic of the
/// observations that enter the comparison. Positions where either side is
/// missing are dropped.
pub fn nrmse(
    obs: &[Option<f64>],
    pred: &[Option<f64>],
    method: NrmseMethod,
    transform: Transform,
    back: BackTransform,
) -> Result<f64, NrmseError> {
    if obs.len() != pred.len() {
        return Err(NrmseError::LengthMismatch {
            obs: obs.len(),
            pred: pred.len(),
        });
    }
    let mut o = Vec::with_capacity(obs.len());
    let mut p = Vec::with_capacity(obs.len());
    for (a, b) in obs.iter().zip(pred.iter()) {
        if let (Some(a), Some(b)) = (a, b) {
            let a = if back.observed() { transform.invert(*a) } else { *a };
            let b = if back.predicted() { transform.invert(*b) } else { *b };
            if !(a.is_finite() && b.is_finite()) {
                return Err(NrmseError::NonFinite);
            }
            o.push(a);
            p.push(b);
        }
    }
    if o.is_empty() {
        return Err(NrmseError::NoCompletePairs);
    }

    let mse = o
        .iter()
        .zip(p.iter())
        .map(|(a, b)| (b - a).powi(2))
        .sum::<f64>()
        / o.len() as f64;
    let denom = method.denominator(&o)?;
    Ok(mse.sqrt() / denom)
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/nrmse.rs"]
mod tests;
