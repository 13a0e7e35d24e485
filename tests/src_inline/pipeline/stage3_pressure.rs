use super::*;
use crate::input::{Series, SeriesTable};
use crate::pipeline::stage1_init::{Stage1Inputs, run_stage1};

const WIGGLE: [f64; 12] = [
    0.3, -0.2, 0.1, -0.35, 0.25, -0.05, 0.15, -0.3, 0.05, 0.2, -0.15, -0.25,
];

fn table(names: &[&str], n: usize, offset: usize) -> SeriesTable {
    let time: Vec<f64> = (0..n).map(|i| 1995.0 + i as f64).collect();
    let series = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<f64> = (0..n)
                .map(|i| 3.0 + (j + 1) as f64 * 0.2 * i as f64 + WIGGLE[(i + j + offset) % 12])
                .collect();
            Series::from_values(*name, &values)
        })
        .collect();
    SeriesTable::new("year", time, series).unwrap()
}

#[test]
fn test_every_pair_is_fitted_indicator_major() {
    let settings = FitSettings::default_v1();
    let ind = table(&["a", "b"], 20, 0);
    let press = table(&["p", "q", "r"], 20, 5);
    let init = run_stage1(&Stage1Inputs {
        indicators: &ind,
        pressures: Some(&press),
        settings: &settings,
    })
    .unwrap();
    let batch = run_stage3(&Stage3Inputs {
        init: &init,
        settings: &settings,
    })
    .unwrap();
    let keys: Vec<(usize, &str)> = batch
        .results
        .iter()
        .map(|r| (r.key.id, r.key.press.as_deref().unwrap()))
        .collect();
    assert_eq!(
        keys,
        vec![(1, "p"), (1, "q"), (1, "r"), (2, "p"), (2, "q"), (2, "r")]
    );
}

#[test]
fn test_no_pressures_gives_empty_batch() {
    let settings = FitSettings::default_v1();
    let ind = table(&["a"], 12, 0);
    let init = run_stage1(&Stage1Inputs {
        indicators: &ind,
        pressures: None,
        settings: &settings,
    })
    .unwrap();
    let batch = run_stage3(&Stage3Inputs {
        init: &init,
        settings: &settings,
    })
    .unwrap();
    assert!(batch.results.is_empty());
    assert!(batch.failures.is_empty());
}
