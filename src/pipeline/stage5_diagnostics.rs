use serde::Serialize;

use crate::pipeline::{FitResult, UnitKey};

/// Per-model statistics. Every field except the key is absent for a failed fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDiagnostics {
    pub key: UnitKey,
    pub n_obs: Option<usize>,
    pub edf: Option<f64>,
    pub p_val: Option<f64>,
    pub signif_code: Option<&'static str>,
    pub r_sq: Option<f64>,
    pub expl_dev: Option<f64>,
    pub aic: Option<f64>,
    pub ks_test: Option<f64>,
    pub tac: Option<bool>,
    pub max_cooks: Option<f64>,
    pub nrmse: Option<f64>,
}

/// Smooth-term p-values, positionally aligned with `results`.
pub fn extract_p_values(results: &[FitResult]) -> Vec<Option<f64>> {
    results
        .iter()
        .map(|r| r.model.as_ref().and_then(|m| m.p_value().ok()))
        .collect()
}

pub fn signif_code(p: f64) -> &'static str {
    if p <= 0.001 {
        "***"
    } else if p <= 0.01 {
        "**"
    } else if p <= 0.05 {
        "*"
    } else if p <= 0.1 {
        "."
    } else {
        " "
    }
}

pub fn run_stage5(results: &[FitResult]) -> Vec<ModelDiagnostics> {
    results.iter().map(diagnose).collect()
}

fn diagnose(result: &FitResult) -> ModelDiagnostics {
    let summary = result.model.as_ref().and_then(|m| match m.summary() {
        Ok(s) => Some(s),
        Err(err) => {
            tracing::debug!(unit = %result.key.label(), error = %err, "diagnostics unavailable");
            None
        }
    });
    match summary {
        Some(s) => ModelDiagnostics {
            key: result.key.clone(),
            n_obs: Some(s.n_obs),
            edf: Some(s.edf),
            p_val: Some(s.p_val),
            signif_code: Some(signif_code(s.p_val)),
            r_sq: s.r_sq,
            expl_dev: s.expl_dev,
            aic: Some(s.aic),
            ks_test: s.ks_test,
            tac: Some(s.tac),
            max_cooks: Some(s.max_cooks),
            nrmse: result.nrmse,
        },
        None => ModelDiagnostics {
            key: result.key.clone(),
            n_obs: None,
            edf: None,
            p_val: None,
            signif_code: None,
            r_sq: None,
            expl_dev: None,
            aic: None,
            ks_test: None,
            tac: None,
            max_cooks: None,
            nrmse: None,
        },
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage5_diagnostics.rs"]
mod tests;
