use approx::assert_abs_diff_eq;

use super::*;
use crate::model::basis::SmoothBasis;
use crate::model::gam::smooth_design;

const WIGGLE: [f64; 12] = [
    0.3, -0.2, 0.1, -0.35, 0.25, -0.05, 0.15, -0.3, 0.05, 0.2, -0.15, -0.25,
];

fn trend_data(n: usize) -> (Vec<f64>, Vec<f64>) {
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let y = x
        .iter()
        .enumerate()
        .map(|(i, t)| 2.0 + 0.5 * t + WIGGLE[i % 12])
        .collect();
    (x, y)
}

#[test]
fn test_gaussian_fit_recovers_trend() {
    let (x, y) = trend_data(20);
    let basis = SmoothBasis::new(&x, 5).unwrap();
    let design = smooth_design(&basis, &x);
    let fit = fit_penalized(&design, &y, Family::gaussian()).unwrap();

    assert!(fit.edf >= 1.0 && fit.edf <= 5.0 + 1e-9);
    assert!(fit.scale > 0.0);
    assert!(fit.lambda > 0.0);
    assert!(fit.iterations >= 1);
    let rss: f64 = y.iter().zip(&fit.mu).map(|(a, b)| (a - b).powi(2)).sum();
    assert_abs_diff_eq!(rss, fit.deviance, epsilon = 1e-9);
    assert!(fit.leverage.iter().all(|h| *h > 0.0 && *h < 1.0));

    let p = block_p_value(&fit, 1..fit.beta.len(), false).unwrap();
    assert!(p < 1e-6);
}

#[test]
fn test_exact_fit_reports_zero_scale() {
    let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
    let y: Vec<f64> = x.iter().map(|t| 1.0 + 2.0 * t).collect();
    let basis = SmoothBasis::new(&x, 4).unwrap();
    let design = smooth_design(&basis, &x);
    assert_eq!(
        fit_penalized(&design, &y, Family::gaussian()).unwrap_err(),
        FitError::ZeroScale
    );
}

#[test]
fn test_poisson_has_unit_scale() {
    let x: Vec<f64> = (0..14).map(|i| i as f64).collect();
    let y = [2.0, 3.0, 5.0, 4.0, 6.0, 8.0, 7.0, 9.0, 11.0, 10.0, 12.0, 14.0, 13.0, 16.0];
    let family = Family::parse("poisson", None).unwrap();
    let basis = SmoothBasis::new(&x, 4).unwrap();
    let design = smooth_design(&basis, &x);
    let fit = fit_penalized(&design, &y, family).unwrap();
    assert_eq!(fit.scale, 1.0);
    assert!(fit.mu.iter().all(|m| *m > 0.0));
    let p = block_p_value(&fit, 1..fit.beta.len(), true).unwrap();
    assert!(p < 0.01);
}

#[test]
fn test_too_few_observations() {
    let x = [0.0, 1.0, 2.0, 3.0];
    let basis = SmoothBasis::new(&x, 4).unwrap();
    let design = smooth_design(&basis, &x);
    assert!(matches!(
        fit_penalized(&design, &[1.0, 2.0, 1.5, 3.0], Family::gaussian()),
        Err(FitError::TooFewObservations { .. })
    ));
}

#[test]
fn test_empty_block_rejected() {
    let (x, y) = trend_data(15);
    let basis = SmoothBasis::new(&x, 4).unwrap();
    let fit = fit_penalized(&smooth_design(&basis, &x), &y, Family::gaussian()).unwrap();
    assert!(block_p_value(&fit, 1..1, false).is_err());
}
