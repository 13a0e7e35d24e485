use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::Serialize;

use crate::model::FitError;
use crate::model::basis::SmoothBasis;
use crate::model::gam::SmoothFit;
use crate::model::pirls::{PenalizedDesign, fit_penalized};
use crate::model::settings::{FitSettings, InteractionSettings};
use crate::model::stats::quantile_type7;
use crate::pipeline::stage1_init::{NamedSeries, Stage1Output};
use crate::pipeline::{FitBatch, UnitKey};

/// Best threshold model found for one (unit, threshold variable) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdTest {
    pub thresh_var: String,
    pub threshold: f64,
    pub score: f64,
    pub base_score: f64,
    pub interaction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitInteraction {
    pub key: UnitKey,
    pub interaction: bool,
    pub tests: Vec<ThresholdTest>,
}

#[derive(Debug, Clone, Default)]
pub struct Stage4Output {
    pub units: Vec<UnitInteraction>,
}

impl Stage4Output {
    /// `None` when the pair was not tested (not significant, or disabled).
    pub fn interaction_for(&self, id: usize, press: &str) -> Option<bool> {
        self.units
            .iter()
            .find(|u| u.key.id == id && u.key.press.as_deref() == Some(press))
            .map(|u| u.interaction)
    }
}

#[derive(Debug, Clone)]
pub struct Stage4Inputs<'a> {
    pub init: &'a Stage1Output,
    pub pressure_fits: &'a FitBatch,
    pub settings: &'a FitSettings,
    pub interaction: &'a InteractionSettings,
    pub alpha: f64,
}

/// Tests every significant pressure model for a threshold interaction with
/// each of the other pressures: `ind ~ regime + s(press, by = regime)`.
pub fn run_stage4(inputs: &Stage4Inputs<'_>) -> Stage4Output {
    if !inputs.interaction.enabled {
        return Stage4Output::default();
    }
    let init = inputs.init;
    let candidates: Vec<&UnitKey> = inputs
        .pressure_fits
        .results
        .iter()
        .filter(|r| r.is_ok() && r.p_val.is_some_and(|p| p <= inputs.alpha))
        .map(|r| &r.key)
        .collect();

    let units: Vec<UnitInteraction> = candidates
        .par_iter()
        .filter_map(|key| {
            let ind = init.indicators.iter().find(|s| s.id == key.id)?;
            let press_name = key.press.as_deref()?;
            let press = init.pressures.iter().find(|s| s.name == press_name)?;
            let tests: Vec<ThresholdTest> = init
                .pressures
                .iter()
                .filter(|t| t.name != press.name)
                .filter_map(|thresh| {
                    match test_threshold_var(init, ind, press, thresh, inputs) {
                        Ok(test) => test,
                        Err(err) => {
                            tracing::debug!(
                                unit = %key.label(),
                                thresh_var = %thresh.name,
                                error = %err,
                                "interaction test skipped"
                            );
                            None
                        }
                    }
                })
                .collect();
            Some(UnitInteraction {
                key: (*key).clone(),
                interaction: tests.iter().any(|t| t.interaction),
                tests,
            })
        })
        .collect();

    tracing::info!(
        tested = units.len(),
        interactions = units.iter().filter(|u| u.interaction).count(),
        "interaction tests done"
    );
    Stage4Output { units }
}

fn test_threshold_var(
    init: &Stage1Output,
    ind: &NamedSeries,
    press: &NamedSeries,
    thresh: &NamedSeries,
    inputs: &Stage4Inputs<'_>,
) -> Result<Option<ThresholdTest>, FitError> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut ts = Vec::new();
    for &i in &init.split.train {
        if let (Some(y), Some(x), Some(t)) = (ind.values[i], press.values[i], thresh.values[i]) {
            ys.push(y);
            xs.push(x);
            ts.push(t);
        }
    }
    let k = inputs.settings.k;
    let family = inputs.settings.family;
    let base = SmoothFit::fit(&xs, &ys, k, family)?;
    let basis = SmoothBasis::new(&xs, k)?;
    let smooth = basis.design(&xs);

    let n = xs.len();
    let min_regime = ((inputs.interaction.min_regime_fraction * n as f64).ceil() as usize).max(2);
    let cfg = inputs.interaction;
    let mut thresholds: Vec<f64> = (0..cfg.n_thresholds)
        .map(|j| {
            let q = if cfg.n_thresholds > 1 {
                cfg.quantile_lo
                    + (cfg.quantile_hi - cfg.quantile_lo) * j as f64 / (cfg.n_thresholds - 1) as f64
            } else {
                cfg.quantile_lo
            };
            quantile_type7(&ts, q)
        })
        .collect();
    thresholds.dedup();

    let mut best: Option<(f64, f64)> = None;
    for threshold in thresholds {
        let upper: Vec<bool> = ts.iter().map(|t| *t > threshold).collect();
        let n_upper = upper.iter().filter(|u| **u).count();
        if n_upper < min_regime || n - n_upper < min_regime {
            continue;
        }
        let design = regime_design(&smooth, basis.penalty(), &upper);
        match fit_penalized(&design, &ys, family) {
            Ok(fit) => {
                if best.is_none_or(|(_, s)| fit.score < s) {
                    best = Some((threshold, fit.score));
                }
            }
            Err(err) => {
                tracing::debug!(threshold, error = %err, "threshold model failed");
            }
        }
    }

    Ok(best.map(|(threshold, score)| ThresholdTest {
        thresh_var: thresh.name.clone(),
        threshold,
        score,
        base_score: base.score(),
        interaction: score < base.score(),
    }))
}

/// Columns `[1, regime, s_low(press), s_high(press)]` with one penalty block
/// per regime smooth.
fn regime_design(smooth: &DMatrix<f64>, penalty: &DMatrix<f64>, upper: &[bool]) -> PenalizedDesign {
    let n = smooth.nrows();
    let m = smooth.ncols();
    let p = 2 + 2 * m;
    let mut x = DMatrix::zeros(n, p);
    for i in 0..n {
        x[(i, 0)] = 1.0;
        let offset = if upper[i] {
            x[(i, 1)] = 1.0;
            2 + m
        } else {
            2
        };
        for j in 0..m {
            x[(i, offset + j)] = smooth[(i, j)];
        }
    }
    let mut s = DMatrix::zeros(p, p);
    for block in [2, 2 + m] {
        for i in 0..m {
            for j in 0..m {
                s[(block + i, block + j)] = penalty[(i, j)];
            }
        }
    }
    PenalizedDesign { x, penalty: s }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_interaction.rs"]
mod tests;
