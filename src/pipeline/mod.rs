pub mod stage1_init;
pub mod stage2_trend;
pub mod stage3_pressure;
pub mod stage4_interaction;
pub mod stage5_diagnostics;
pub mod stage6_scoring;
pub mod stage7_summary;

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::criteria::CriteriaTemplate;
use crate::input::{ExpertScore, InputError, SeriesTable};
use crate::model::FitError;
use crate::model::gam::SmoothFit;
use crate::model::nrmse::{NrmseError, nrmse};
use crate::model::scores::ScoreTable;
use crate::model::settings::{FitSettings, InteractionSettings, ScoringProfile, SplitMode};
use crate::pipeline::stage1_init::{Split, Stage1Inputs, Stage1Output, run_stage1};
use crate::pipeline::stage2_trend::{Stage2Inputs, run_stage2};
use crate::pipeline::stage3_pressure::{Stage3Inputs, run_stage3};
use crate::pipeline::stage4_interaction::{Stage4Inputs, Stage4Output, run_stage4};
use crate::pipeline::stage5_diagnostics::{ModelDiagnostics, run_stage5};
use crate::pipeline::stage6_scoring::{Stage6Inputs, run_stage6};
use crate::pipeline::stage7_summary::{Stage7Inputs, SummaryViews, run_stage7};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Identity of one fitted unit: an indicator, optionally paired with a pressure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnitKey {
    pub id: usize,
    pub ind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub press: Option<String>,
}

impl UnitKey {
    pub fn label(&self) -> String {
        match &self.press {
            Some(press) => format!("{} ({}) ~ {}", self.ind, self.id, press),
            None => format!("{} ({})", self.ind, self.id),
        }
    }
}

/// Predictions over the training window: every time step from the first to
/// the last training index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingWindow {
    pub time: Vec<f64>,
    pub pred: Vec<Option<f64>>,
    pub ci_up: Vec<Option<f64>>,
    pub ci_low: Vec<Option<f64>>,
    /// Observation not used for fitting because a value was missing.
    pub train_na: Vec<bool>,
    /// Random splits only: `train_na` plus test points inside the window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_na_reconciled: Option<Vec<bool>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    pub key: UnitKey,
    #[serde(skip)]
    pub model: Option<SmoothFit>,
    pub error: Option<String>,
    pub p_val: Option<f64>,
    pub nrmse: Option<f64>,
    pub window: TrainingWindow,
}

impl FitResult {
    pub fn is_ok(&self) -> bool {
        self.model.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitFailure {
    pub key: UnitKey,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct FitBatch {
    pub results: Vec<FitResult>,
    pub failures: Vec<FitFailure>,
}

/// One unit's covariate and response, aligned with the shared time axis.
pub struct UnitData<'a> {
    pub key: UnitKey,
    pub x: Vec<Option<f64>>,
    pub y: &'a [Option<f64>],
}

/// Fits every unit in parallel. A failing unit becomes a failure record;
/// the batch only fails when no unit could be fitted.
pub fn run_batch(
    units: Vec<UnitData<'_>>,
    time: &[f64],
    split: &Split,
    settings: &FitSettings,
) -> Result<FitBatch, FitError> {
    let results: Vec<FitResult> = units
        .par_iter()
        .map(|unit| fit_unit(unit, time, split, settings))
        .collect();

    let failures: Vec<FitFailure> = results
        .iter()
        .filter_map(|r| {
            r.error.as_ref().map(|e| FitFailure {
                key: r.key.clone(),
                error: e.clone(),
            })
        })
        .collect();

    if !results.is_empty() && failures.len() == results.len() {
        return Err(FitError::AllFailed {
            n_units: results.len(),
            first: failures[0].error.clone(),
        });
    }
    if !failures.is_empty() {
        let listing = failures
            .iter()
            .map(|f| format!("{}: {}", f.key.label(), f.error))
            .collect::<Vec<_>>()
            .join("; ");
        tracing::warn!(
            failed = failures.len(),
            total = results.len(),
            "some model fits failed: {listing}"
        );
    }
    Ok(FitBatch { results, failures })
}

fn fit_unit(unit: &UnitData<'_>, time: &[f64], split: &Split, settings: &FitSettings) -> FitResult {
    let mut xs = Vec::with_capacity(split.train.len());
    let mut ys = Vec::with_capacity(split.train.len());
    for &i in &split.train {
        if let (Some(x), Some(y)) = (unit.x[i], unit.y[i]) {
            xs.push(x);
            ys.push(y);
        }
    }

    let outcome = SmoothFit::fit(&xs, &ys, settings.k, settings.family).and_then(|model| {
        let p_val = model.p_value()?;
        let nrmse = test_nrmse(&model, unit, split, settings)?;
        Ok((model, p_val, nrmse))
    });

    match outcome {
        Ok((model, p_val, nrmse)) => {
            let window = training_window(Some(&model), unit, time, split, settings);
            FitResult {
                key: unit.key.clone(),
                model: Some(model),
                error: None,
                p_val: Some(p_val),
                nrmse,
                window,
            }
        }
        Err(err) => {
            tracing::debug!(unit = %unit.key.label(), error = %err, "model fit failed");
            FitResult {
                key: unit.key.clone(),
                model: None,
                error: Some(err.to_string()),
                p_val: None,
                nrmse: None,
                window: training_window(None, unit, time, split, settings),
            }
        }
    }
}

fn test_nrmse(
    model: &SmoothFit,
    unit: &UnitData<'_>,
    split: &Split,
    settings: &FitSettings,
) -> Result<Option<f64>, FitError> {
    if split.test.is_empty() {
        return Ok(None);
    }
    let obs: Vec<Option<f64>> = split.test.iter().map(|&i| unit.y[i]).collect();
    let pred = predict_at(model, split.test.iter().map(|&i| unit.x[i]));
    match nrmse(
        &obs,
        &pred,
        settings.nrmse_method,
        settings.transform,
        settings.back_transform,
    ) {
        Ok(value) => Ok(Some(value)),
        Err(NrmseError::Undefined { method, n_pairs }) => {
            tracing::debug!(
                unit = %unit.key.label(),
                method,
                n_pairs,
                "test-set nrmse undefined"
            );
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn predict_at(model: &SmoothFit, xs: impl Iterator<Item = Option<f64>>) -> Vec<Option<f64>> {
    let xs: Vec<Option<f64>> = xs.collect();
    let present: Vec<f64> = xs.iter().flatten().copied().collect();
    let mut points = model.predict(&present).into_iter();
    xs.iter()
        .map(|x| x.and_then(|_| points.next().map(|p| p.pred)))
        .collect()
}

fn training_window(
    model: Option<&SmoothFit>,
    unit: &UnitData<'_>,
    time: &[f64],
    split: &Split,
    settings: &FitSettings,
) -> TrainingWindow {
    let (Some(&first), Some(&last)) = (split.train.first(), split.train.last()) else {
        return TrainingWindow {
            time: Vec::new(),
            pred: Vec::new(),
            ci_up: Vec::new(),
            ci_low: Vec::new(),
            train_na: Vec::new(),
            train_na_reconciled: None,
        };
    };
    let rows: Vec<usize> = (first..=last).collect();
    let train_na: Vec<bool> = rows
        .iter()
        .map(|&i| unit.x[i].is_none() || unit.y[i].is_none())
        .collect();

    let n = rows.len();
    let (mut pred, mut ci_up, mut ci_low) = (vec![None; n], vec![None; n], vec![None; n]);
    if let Some(model) = model {
        let present: Vec<(usize, f64)> = rows
            .iter()
            .enumerate()
            .filter_map(|(pos, &i)| unit.x[i].map(|x| (pos, x)))
            .collect();
        let xs: Vec<f64> = present.iter().map(|(_, x)| *x).collect();
        for ((pos, _), point) in present.iter().zip(model.predict(&xs)) {
            pred[*pos] = Some(point.pred);
            ci_up[*pos] = Some(point.ci_up);
            ci_low[*pos] = Some(point.ci_low);
        }
    }

    let train_na_reconciled = match settings.split {
        SplitMode::Sequential => None,
        SplitMode::Random { .. } => Some(
            rows.iter()
                .zip(train_na.iter())
                .map(|(i, na)| *na || split.test.binary_search(i).is_ok())
                .collect(),
        ),
    };

    TrainingWindow {
        time: rows.iter().map(|&i| time[i]).collect(),
        pred,
        ci_up,
        ci_low,
        train_na,
        train_na_reconciled,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/mod.rs"]
mod tests;

#[derive(Debug, Clone)]
pub struct AssessmentInputs<'a> {
    pub indicators: &'a SeriesTable,
    pub pressures: Option<&'a SeriesTable>,
    pub press_types: &'a BTreeMap<String, String>,
    pub expert: Option<&'a [ExpertScore]>,
    pub template: &'a CriteriaTemplate,
    pub fit: &'a FitSettings,
    pub interaction: &'a InteractionSettings,
    pub scoring: &'a ScoringProfile,
}

#[derive(Debug, Clone)]
pub struct Assessment {
    pub init: Stage1Output,
    pub trend: FitBatch,
    pub pressure: FitBatch,
    pub interactions: Stage4Output,
    pub trend_diagnostics: Vec<ModelDiagnostics>,
    pub pressure_diagnostics: Vec<ModelDiagnostics>,
    pub scores: ScoreTable,
    pub views: SummaryViews,
}

/// Runs every stage from validated tables to the summary views.
pub fn run_assessment(inputs: &AssessmentInputs<'_>) -> Result<Assessment, PipelineError> {
    inputs.scoring.validate()?;
    let init = run_stage1(&Stage1Inputs {
        indicators: inputs.indicators,
        pressures: inputs.pressures,
        settings: inputs.fit,
    })?;
    let trend = run_stage2(&Stage2Inputs {
        init: &init,
        settings: inputs.fit,
    })?;
    let pressure = run_stage3(&Stage3Inputs {
        init: &init,
        settings: inputs.fit,
    })?;
    let interactions = run_stage4(&Stage4Inputs {
        init: &init,
        pressure_fits: &pressure,
        settings: inputs.fit,
        interaction: inputs.interaction,
        alpha: inputs.scoring.alpha,
    });
    let trend_diagnostics = run_stage5(&trend.results);
    let pressure_diagnostics = run_stage5(&pressure.results);
    let scores = run_stage6(&Stage6Inputs {
        template: inputs.template,
        profile: inputs.scoring,
        indicators: &init.indicators,
        trend: &trend_diagnostics,
        pressure: &pressure_diagnostics,
        interactions: &interactions,
        press_types: inputs.press_types,
        expert: inputs.expert,
    })?;
    let views = run_stage7(&Stage7Inputs {
        scores: &scores,
        template: inputs.template,
        missing_pressure: inputs.scoring.missing_pressure,
    })?;
    Ok(Assessment {
        init,
        trend,
        pressure,
        interactions,
        trend_diagnostics,
        pressure_diagnostics,
        scores,
        views,
    })
}
