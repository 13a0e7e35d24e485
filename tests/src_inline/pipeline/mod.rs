use super::*;
use crate::input::Series;
use crate::model::family::{Family, FamilyKind, Link};
use crate::model::nrmse::NrmseMethod;
use crate::model::scores::CriterionGroups;
use crate::pipeline::stage1_init::split_indices;

const WIGGLE: [f64; 12] = [
    0.3, -0.2, 0.1, -0.35, 0.25, -0.05, 0.15, -0.3, 0.05, 0.2, -0.15, -0.25,
];

fn years(n: usize) -> Vec<f64> {
    (0..n).map(|i| 1990.0 + i as f64).collect()
}

fn growing(n: usize, rate: f64) -> Vec<f64> {
    (0..n)
        .map(|i| (rate * i as f64).exp() * (1.0 + 0.2 * WIGGLE[i % 12]))
        .collect()
}

fn key(id: usize, ind: &str) -> UnitKey {
    UnitKey {
        id,
        ind: ind.to_string(),
        press: None,
    }
}

#[test]
fn test_unit_key_label() {
    assert_eq!(key(3, "cod").label(), "cod (3)");
    let mut k = key(3, "cod");
    k.press = Some("fishing".to_string());
    assert_eq!(k.label(), "cod (3) ~ fishing");
}

#[test]
fn test_batch_fails_only_when_every_unit_fails() {
    let n = 12;
    let time = years(n);
    let x: Vec<Option<f64>> = time.iter().map(|t| Some(*t)).collect();
    let constant = vec![Some(4.0); n];
    let split = split_indices(n, 1.0, SplitMode::Sequential).unwrap();
    let mut settings = FitSettings::default_v1();
    settings.family = Family::new(FamilyKind::Gamma, Link::Log).unwrap();

    let units = vec![
        UnitData {
            key: key(1, "a"),
            x: x.clone(),
            y: &constant,
        },
        UnitData {
            key: key(2, "b"),
            x,
            y: &constant,
        },
    ];
    match run_batch(units, &time, &split, &settings) {
        Err(FitError::AllFailed { n_units, .. }) => assert_eq!(n_units, 2),
        other => panic!("expected AllFailed, got {other:?}"),
    }
}

#[test]
fn test_empty_batch_is_ok() {
    let split = split_indices(5, 1.0, SplitMode::Sequential).unwrap();
    let batch = run_batch(Vec::new(), &years(5), &split, &FitSettings::default_v1()).unwrap();
    assert!(batch.results.is_empty());
    assert!(batch.failures.is_empty());
}

#[test]
fn test_random_split_window_marks_test_points() {
    let n = 20;
    let time = years(n);
    let x: Vec<Option<f64>> = time.iter().map(|t| Some(*t)).collect();
    let y: Vec<Option<f64>> = growing(n, 0.05).into_iter().map(Some).collect();
    let mut settings = FitSettings::default_v1();
    settings.train_fraction = 0.7;
    settings.split = SplitMode::Random { seed: 11 };
    let split = split_indices(n, settings.train_fraction, settings.split).unwrap();

    let batch = run_batch(
        vec![UnitData {
            key: key(1, "a"),
            x,
            y: &y,
        }],
        &time,
        &split,
        &settings,
    )
    .unwrap();
    let window = &batch.results[0].window;
    let first = split.train[0];
    let reconciled = window.train_na_reconciled.as_ref().unwrap();
    assert_eq!(reconciled.len(), window.time.len());
    for (pos, flagged) in reconciled.iter().enumerate() {
        assert_eq!(*flagged, split.test.contains(&(first + pos)));
    }
    assert!(window.train_na.iter().all(|na| !na));
    assert!(batch.results[0].nrmse.is_some());
}

fn inputs_table(names: &[&str], columns: Vec<Vec<f64>>) -> SeriesTable {
    let n = columns[0].len();
    let series = names
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::from_values(*name, &values))
        .collect();
    SeriesTable::new("year", years(n), series).unwrap()
}

#[test]
fn test_assessment_indicator_only() {
    let n = 24;
    let ind = inputs_table(
        &["a", "b", "c"],
        vec![growing(n, 0.08), growing(n, 0.02), growing(n, -0.05)],
    );
    let template = CriteriaTemplate::builtin();
    let fit = FitSettings::default_v1();
    let interaction = InteractionSettings::default_v1();
    let scoring = ScoringProfile::default_v1();
    let press_types = BTreeMap::new();

    let out = run_assessment(&AssessmentInputs {
        indicators: &ind,
        pressures: None,
        press_types: &press_types,
        expert: None,
        template: &template,
        fit: &fit,
        interaction: &interaction,
        scoring: &scoring,
    })
    .unwrap();

    assert_eq!(out.trend.results.len(), 3);
    assert!(out.pressure.results.is_empty());
    assert_eq!(out.views.groups, CriterionGroups::IndicatorOnly);
    assert_eq!(out.views.overview.rows.len(), 3);
    assert!(out.views.breakdown.is_none());
    for row in &out.views.overview.rows {
        assert_eq!(row.nr_sign_press, None);
    }
}

#[test]
fn test_assessment_with_pressures() {
    let n = 30;
    let driver: Vec<f64> = (0..n).map(|i| 1.0 + i as f64 * 0.3 + WIGGLE[i % 12]).collect();
    let noise: Vec<f64> = (0..n).map(|i| 5.0 + WIGGLE[(i * 7) % 12]).collect();
    let flat: Vec<f64> = (0..n).map(|i| 3.0 + WIGGLE[(i * 5) % 12]).collect();
    let responsive: Vec<f64> = driver
        .iter()
        .enumerate()
        .map(|(i, d)| 2.0 + 1.5 * d + 0.1 * WIGGLE[(i + 5) % 12])
        .collect();
    let ind = inputs_table(&["resp", "flat"], vec![responsive, flat]);
    let press = inputs_table(&["driver", "noise"], vec![driver, noise]);
    let template = CriteriaTemplate::builtin();
    let fit = FitSettings::default_v1();
    let interaction = InteractionSettings::default_v1();
    let scoring = ScoringProfile::default_v1();
    let mut press_types = BTreeMap::new();
    press_types.insert("driver".to_string(), "fishing".to_string());

    let out = run_assessment(&AssessmentInputs {
        indicators: &ind,
        pressures: Some(&press),
        press_types: &press_types,
        expert: None,
        template: &template,
        fit: &fit,
        interaction: &interaction,
        scoring: &scoring,
    })
    .unwrap();

    assert_eq!(out.pressure.results.len(), 4);
    assert_eq!(out.pressure_diagnostics.len(), 4);
    assert_eq!(out.views.groups, CriterionGroups::Both);
    let breakdown = out.views.breakdown.as_ref().unwrap();
    assert_eq!(breakdown.rows.len(), 4);
    assert!(out.views.overview.rows.iter().all(|r| r.nr_sign_press.is_some()));
    let resp = &out.scores.records[0];
    let driver = resp
        .pressures
        .as_ref()
        .unwrap()
        .iter()
        .find(|p| p.press == "driver")
        .unwrap();
    assert!(driver.is_significant());
    assert_eq!(driver.press_type.as_deref(), Some("fishing"));
}

#[test]
fn test_assessment_rejects_invalid_profile() {
    let ind = inputs_table(&["a"], vec![growing(12, 0.1)]);
    let template = CriteriaTemplate::builtin();
    let fit = FitSettings::default_v1();
    let interaction = InteractionSettings::default_v1();
    let mut scoring = ScoringProfile::default_v1();
    scoring.alpha = 1.5;
    let press_types = BTreeMap::new();
    let err = run_assessment(&AssessmentInputs {
        indicators: &ind,
        pressures: None,
        press_types: &press_types,
        expert: None,
        template: &template,
        fit: &fit,
        interaction: &interaction,
        scoring: &scoring,
    });
    assert!(matches!(err, Err(PipelineError::Input(_))));
}

#[test]
fn test_default_settings_on_short_series_keep_every_fit() {
    let n = 10;
    let time = years(n);
    let x: Vec<Option<f64>> = time.iter().map(|t| Some(*t)).collect();
    let up: Vec<Option<f64>> = growing(n, 0.1).into_iter().map(Some).collect();
    let down: Vec<Option<f64>> = growing(n, -0.1).into_iter().map(Some).collect();
    let mut settings = FitSettings::default_v1();
    let split = split_indices(n, settings.train_fraction, settings.split).unwrap();
    assert_eq!(split.test, vec![9]);

    let units = |x: &[Option<f64>]| {
        vec![
            UnitData {
                key: key(1, "up"),
                x: x.to_vec(),
                y: &up,
            },
            UnitData {
                key: key(2, "down"),
                x: x.to_vec(),
                y: &down,
            },
        ]
    };
    let batch = run_batch(units(&x), &time, &split, &settings).unwrap();
    assert!(batch.failures.is_empty());
    assert!(batch.results.iter().all(|r| r.is_ok() && r.nrmse.is_none()));

    settings.nrmse_method = NrmseMethod::Mean;
    let batch = run_batch(units(&x), &time, &split, &settings).unwrap();
    assert!(batch.results.iter().all(|r| r.nrmse.is_some()));
}
