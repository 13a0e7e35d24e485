use crate::model::FitError;
use crate::model::settings::FitSettings;
use crate::pipeline::stage1_init::Stage1Output;
use crate::pipeline::{FitBatch, UnitData, UnitKey, run_batch};

#[derive(Debug, Clone)]
pub struct Stage2Inputs<'a> {
    pub init: &'a Stage1Output,
    pub settings: &'a FitSettings,
}

/// Fits `ind ~ s(time)` for every indicator.
pub fn run_stage2(inputs: &Stage2Inputs<'_>) -> Result<FitBatch, FitError> {
    let init = inputs.init;
    let time: Vec<Option<f64>> = init.time.iter().map(|t| Some(*t)).collect();
    let units = init
        .indicators
        .iter()
        .map(|ind| UnitData {
            key: UnitKey {
                id: ind.id,
                ind: ind.name.clone(),
                press: None,
            },
            x: time.clone(),
            y: &ind.values,
        })
        .collect();

    let batch = run_batch(units, &init.time, &init.split, inputs.settings)?;
    tracing::info!(
        fitted = batch.results.len() - batch.failures.len(),
        failed = batch.failures.len(),
        family = %inputs.settings.family.label(),
        "trend models fitted"
    );
    Ok(batch)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_trend.rs"]
mod tests;
