use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::input::names::sanitize_name;
use crate::input::{InputError, SeriesTable};
use crate::model::settings::{FitSettings, SplitMode};
use crate::model::stats::round_half_even;

/// Train/test partition of the row indices `0..n`, both ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// An ingested series with its stable 1-based id and sanitized name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSeries {
    pub id: usize,
    pub name: String,
    pub raw_name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct Stage1Output {
    pub time: Vec<f64>,
    pub indicators: Vec<NamedSeries>,
    pub pressures: Vec<NamedSeries>,
    pub split: Split,
}

#[derive(Debug, Clone)]
pub struct Stage1Inputs<'a> {
    pub indicators: &'a SeriesTable,
    pub pressures: Option<&'a SeriesTable>,
    pub settings: &'a FitSettings,
}

pub fn split_indices(n: usize, train_fraction: f64, mode: SplitMode) -> Result<Split, InputError> {
    if !(0.0..=1.0).contains(&train_fraction) {
        return Err(InputError::InvalidInput(format!(
            "train fraction must be within [0, 1], got {train_fraction}"
        )));
    }
    let n_train = (round_half_even(train_fraction * n as f64) as usize).min(n);
    let train: Vec<usize> = match mode {
        SplitMode::Sequential => (0..n_train).collect(),
        SplitMode::Random { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut picked = rand::seq::index::sample(&mut rng, n, n_train).into_vec();
            picked.sort_unstable();
            picked
        }
    };
    let mut in_train = vec![false; n];
    for &i in &train {
        in_train[i] = true;
    }
    let test = (0..n).filter(|i| !in_train[*i]).collect();
    Ok(Split { train, test })
}

/// Validates the inputs, sanitizes names and computes the shared split.
pub fn run_stage1(inputs: &Stage1Inputs<'_>) -> Result<Stage1Output, InputError> {
    inputs.settings.validate()?;
    let table = inputs.indicators;

    if let Some(press) = inputs.pressures {
        if press.time.len() != table.time.len() {
            return Err(InputError::InvalidInput(format!(
                "pressure table has {} rows but the indicator table has {}",
                press.time.len(),
                table.time.len()
            )));
        }
        if press.time != table.time {
            return Err(InputError::InvalidInput(
                "pressure and indicator tables must share the same time values".to_string(),
            ));
        }
    }

    let indicators = named_series(table, "indicator")?;
    let pressures = match inputs.pressures {
        Some(press) => named_series(press, "pressure")?,
        None => Vec::new(),
    };
    let split = split_indices(
        table.n_rows(),
        inputs.settings.train_fraction,
        inputs.settings.split,
    )?;

    tracing::info!(
        indicators = indicators.len(),
        pressures = pressures.len(),
        rows = table.n_rows(),
        train = split.train.len(),
        test = split.test.len(),
        "inputs validated"
    );

    Ok(Stage1Output {
        time: table.time.clone(),
        indicators,
        pressures,
        split,
    })
}

fn named_series(table: &SeriesTable, what: &str) -> Result<Vec<NamedSeries>, InputError> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(table.series.len());
    for (idx, s) in table.series.iter().enumerate() {
        let name = sanitize_name(&s.name);
        if !seen.insert(name.clone()) {
            return Err(InputError::InvalidInput(format!(
                "{what} names '{}' collide after sanitizing to '{name}'",
                s.name
            )));
        }
        out.push(NamedSeries {
            id: idx + 1,
            name,
            raw_name: s.name.clone(),
            values: s.values.clone(),
        });
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_init.rs"]
mod tests;
