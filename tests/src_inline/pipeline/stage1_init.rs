use proptest::prelude::*;

use super::*;
use crate::input::Series;

fn table(names: &[&str], n: usize) -> SeriesTable {
    let time: Vec<f64> = (0..n).map(|i| 1980.0 + i as f64).collect();
    let series = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<f64> = (0..n).map(|i| (i * (j + 1)) as f64).collect();
            Series::from_values(*name, &values)
        })
        .collect();
    SeriesTable::new("year", time, series).unwrap()
}

fn check_partition(split: &Split, n: usize, frac: f64) {
    let expected = (frac * n as f64).round_ties_even() as usize;
    assert_eq!(split.train.len(), expected);
    assert_eq!(split.train.len() + split.test.len(), n);
    assert!(split.train.windows(2).all(|w| w[0] < w[1]));
    assert!(split.test.windows(2).all(|w| w[0] < w[1]));
    let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..n).collect::<Vec<_>>());
}

proptest! {
    #[test]
    fn prop_sequential_split_partitions(n in 0usize..200, frac in 0.0f64..=1.0) {
        let split = split_indices(n, frac, SplitMode::Sequential).unwrap();
        check_partition(&split, n, frac);
        let n_train = split.train.len();
        prop_assert_eq!(split.train, (0..n_train).collect::<Vec<_>>());
    }

    #[test]
    fn prop_random_split_partitions(n in 0usize..200, frac in 0.0f64..=1.0, seed in any::<u64>()) {
        let split = split_indices(n, frac, SplitMode::Random { seed }).unwrap();
        check_partition(&split, n, frac);
    }
}

#[test]
fn test_round_half_to_even_split_size() {
    let split = split_indices(5, 0.5, SplitMode::Sequential).unwrap();
    assert_eq!(split.train, vec![0, 1]);
    let split = split_indices(7, 0.5, SplitMode::Sequential).unwrap();
    assert_eq!(split.train.len(), 4);
}

#[test]
fn test_full_training_leaves_no_test() {
    let split = split_indices(10, 1.0, SplitMode::Sequential).unwrap();
    assert_eq!(split.train.len(), 10);
    assert!(split.test.is_empty());
}

#[test]
fn test_random_split_is_seeded() {
    let a = split_indices(50, 0.7, SplitMode::Random { seed: 7 }).unwrap();
    let b = split_indices(50, 0.7, SplitMode::Random { seed: 7 }).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_out_of_range_fraction_rejected() {
    assert!(split_indices(10, 1.5, SplitMode::Sequential).is_err());
    assert!(split_indices(10, -0.1, SplitMode::Sequential).is_err());
    assert!(split_indices(10, f64::NAN, SplitMode::Sequential).is_err());
}

#[test]
fn test_stage1_sanitizes_and_numbers_series() {
    let ind = table(&["Cod SSB", "2nd"], 12);
    let press = table(&["fishing"], 12);
    let settings = FitSettings::default_v1();
    let out = run_stage1(&Stage1Inputs {
        indicators: &ind,
        pressures: Some(&press),
        settings: &settings,
    })
    .unwrap();
    assert_eq!(out.indicators[0].name, "Cod_SSB");
    assert_eq!(out.indicators[0].raw_name, "Cod SSB");
    assert_eq!(out.indicators[1].name, "X2nd");
    assert_eq!(out.indicators[1].id, 2);
    assert_eq!(out.pressures[0].id, 1);
    assert_eq!(out.split.train.len(), 11);
}

#[test]
fn test_stage1_rejects_name_collision() {
    let ind = table(&["a b", "a_b"], 8);
    let settings = FitSettings::default_v1();
    assert!(
        run_stage1(&Stage1Inputs {
            indicators: &ind,
            pressures: None,
            settings: &settings,
        })
        .is_err()
    );
}

#[test]
fn test_stage1_rejects_misaligned_pressures() {
    let ind = table(&["a"], 8);
    let press = table(&["p"], 9);
    let settings = FitSettings::default_v1();
    assert!(
        run_stage1(&Stage1Inputs {
            indicators: &ind,
            pressures: Some(&press),
            settings: &settings,
        })
        .is_err()
    );
}

#[test]
fn test_stage1_rejects_invalid_settings() {
    let ind = table(&["a"], 8);
    let mut settings = FitSettings::default_v1();
    settings.k = 3;
    assert!(
        run_stage1(&Stage1Inputs {
            indicators: &ind,
            pressures: None,
            settings: &settings,
        })
        .is_err()
    );
}
