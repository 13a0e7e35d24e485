use statrs::distribution::{ContinuousCDF, Normal};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Undefined for fewer than
/// two values.
pub fn sample_sd(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Linear-interpolation quantile on sorted data (Hyndman & Fan type 7).
pub fn quantile_type7(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Rounds half to even, matching the IEC 60559 rounding used by most
/// statistics environments.
pub fn round_half_even(x: f64) -> f64 {
    x.round_ties_even()
}

/// One-sample Kolmogorov–Smirnov test of `values` against N(0, 1).
/// Returns the asymptotic p-value, or `None` for fewer than three values.
pub fn ks_normal_p_value(values: &[f64]) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    let normal = Normal::new(0.0, 1.0).ok()?;
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len() as f64;
    let mut d = 0.0f64;
    for (i, v) in sorted.iter().enumerate() {
        let f = normal.cdf(*v);
        let upper = (i + 1) as f64 / n - f;
        let lower = f - i as f64 / n;
        d = d.max(upper).max(lower);
    }
    let sqrt_n = n.sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d;
    Some(kolmogorov_q(lambda))
}

fn kolmogorov_q(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    for j in 1..=100 {
        let jf = j as f64;
        let term = sign * (-2.0 * jf * jf * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-12 {
            break;
        }
        sign = -sign;
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Autocorrelation of `values` at lags `1..=max_lag`.
pub fn acf(values: &[f64], max_lag: usize) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return Vec::new();
    }
    let m = mean(values);
    let denom = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    let max_lag = max_lag.min(n - 1);
    (1..=max_lag)
        .map(|lag| {
            if denom == 0.0 {
                return 0.0;
            }
            let num = (0..n - lag)
                .map(|t| (values[t] - m) * (values[t + lag] - m))
                .sum::<f64>();
            num / denom
        })
        .collect()
}

/// True when any residual autocorrelation at lags 1..=5 leaves the
/// approximate 95 % band `±1.96/√n`.
pub fn has_temporal_autocorrelation(residuals: &[f64]) -> bool {
    if residuals.len() < 3 {
        return false;
    }
    let bound = 1.96 / (residuals.len() as f64).sqrt();
    acf(residuals, 5).iter().any(|r| r.abs() > bound)
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/stats.rs"]
mod tests;
