use crate::model::FitError;
use crate::model::settings::FitSettings;
use crate::pipeline::stage1_init::Stage1Output;
use crate::pipeline::{FitBatch, UnitData, UnitKey, run_batch};

#[derive(Debug, Clone)]
pub struct Stage3Inputs<'a> {
    pub init: &'a Stage1Output,
    pub settings: &'a FitSettings,
}

/// Fits `ind ~ s(press)` for every (indicator, pressure) pair, indicator-major.
/// Returns an empty batch when no pressures were supplied.
pub fn run_stage3(inputs: &Stage3Inputs<'_>) -> Result<FitBatch, FitError> {
    let init = inputs.init;
    if init.pressures.is_empty() {
        return Ok(FitBatch {
            results: Vec::new(),
            failures: Vec::new(),
        });
    }
    let mut units = Vec::with_capacity(init.indicators.len() * init.pressures.len());
    for ind in &init.indicators {
        for press in &init.pressures {
            units.push(UnitData {
                key: UnitKey {
                    id: ind.id,
                    ind: ind.name.clone(),
                    press: Some(press.name.clone()),
                },
                x: press.values.clone(),
                y: &ind.values,
            });
        }
    }

    let batch = run_batch(units, &init.time, &init.split, inputs.settings)?;
    tracing::info!(
        fitted = batch.results.len() - batch.failures.len(),
        failed = batch.failures.len(),
        "pressure models fitted"
    );
    Ok(batch)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_pressure.rs"]
mod tests;
