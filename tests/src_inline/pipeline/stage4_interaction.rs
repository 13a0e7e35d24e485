use super::*;
use crate::input::{Series, SeriesTable};
use crate::pipeline::stage1_init::{Stage1Inputs, run_stage1};
use crate::pipeline::stage3_pressure::{Stage3Inputs, run_stage3};

const WIGGLE: [f64; 12] = [
    0.3, -0.2, 0.1, -0.35, 0.25, -0.05, 0.15, -0.3, 0.05, 0.2, -0.15, -0.25,
];

fn table(columns: Vec<(&str, Vec<f64>)>) -> SeriesTable {
    let n = columns[0].1.len();
    let time: Vec<f64> = (0..n).map(|i| 1980.0 + i as f64).collect();
    let series = columns
        .into_iter()
        .map(|(name, values)| Series::from_values(name, &values))
        .collect();
    SeriesTable::new("year", time, series).unwrap()
}

/// The response slope on `press` switches with the parity regime in `thresh`.
fn regime_switch(n: usize) -> (SeriesTable, SeriesTable) {
    let press: Vec<f64> = (0..n).map(|i| 0.25 * i as f64 + 0.5 * WIGGLE[i % 12]).collect();
    let thresh: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 0.0 } else { 10.0 }).collect();
    let ind: Vec<f64> = (0..n)
        .map(|i| {
            let slope = if i % 2 == 0 { 3.0 } else { 0.5 };
            5.0 + slope * press[i] + 0.1 * WIGGLE[(i + 4) % 12]
        })
        .collect();
    (
        table(vec![("ind", ind)]),
        table(vec![("press", press), ("thresh", thresh)]),
    )
}

fn run(
    ind: &SeriesTable,
    press: &SeriesTable,
    interaction: &InteractionSettings,
) -> Stage4Output {
    let settings = FitSettings::default_v1();
    let init = run_stage1(&Stage1Inputs {
        indicators: ind,
        pressures: Some(press),
        settings: &settings,
    })
    .unwrap();
    let fits = run_stage3(&Stage3Inputs {
        init: &init,
        settings: &settings,
    })
    .unwrap();
    run_stage4(&Stage4Inputs {
        init: &init,
        pressure_fits: &fits,
        settings: &settings,
        interaction,
        alpha: 0.05,
    })
}

#[test]
fn test_disabled_gives_no_units() {
    let (ind, press) = regime_switch(40);
    let mut cfg = InteractionSettings::default_v1();
    cfg.enabled = false;
    let out = run(&ind, &press, &cfg);
    assert!(out.units.is_empty());
    assert_eq!(out.interaction_for(1, "press"), None);
}

#[test]
fn test_single_pressure_has_no_threshold_variables() {
    let n = 30;
    let press: Vec<f64> = (0..n).map(|i| i as f64 + WIGGLE[i % 12]).collect();
    let ind: Vec<f64> = press
        .iter()
        .enumerate()
        .map(|(i, p)| 1.0 + 2.0 * p + 0.2 * WIGGLE[(i + 3) % 12])
        .collect();
    let out = run(
        &table(vec![("ind", ind)]),
        &table(vec![("press", press)]),
        &InteractionSettings::default_v1(),
    );
    assert_eq!(out.units.len(), 1);
    assert!(out.units[0].tests.is_empty());
    assert_eq!(out.interaction_for(1, "press"), Some(false));
}

#[test]
fn test_regime_switch_is_detected() {
    let (ind, press) = regime_switch(40);
    let out = run(&ind, &press, &InteractionSettings::default_v1());
    assert_eq!(out.interaction_for(1, "press"), Some(true));
    let unit = out
        .units
        .iter()
        .find(|u| u.key.press.as_deref() == Some("press"))
        .unwrap();
    let test = unit.tests.iter().find(|t| t.thresh_var == "thresh").unwrap();
    assert_eq!(test.threshold, 0.0);
    assert!(test.score < test.base_score);
    assert_eq!(unit.interaction, unit.tests.iter().any(|t| t.interaction));
}

#[test]
fn test_regime_design_layout() {
    let smooth = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let penalty = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, -1.0, 1.0]);
    let design = regime_design(&smooth, &penalty, &[false, true, false]);
    assert_eq!(design.x.ncols(), 6);
    let row = |i: usize| design.x.row(i).iter().copied().collect::<Vec<_>>();
    assert_eq!(row(0), vec![1.0, 0.0, 1.0, 2.0, 0.0, 0.0]);
    assert_eq!(row(1), vec![1.0, 1.0, 0.0, 0.0, 3.0, 4.0]);
    assert_eq!(design.penalty[(2, 3)], -1.0);
    assert_eq!(design.penalty[(4, 4)], 1.0);
    assert_eq!(design.penalty[(0, 0)], 0.0);
    assert_eq!(design.penalty[(2, 4)], 0.0);
}
