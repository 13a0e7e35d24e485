use std::cmp::Ordering;
use std::ops::Range;

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};

use crate::model::FitError;
use crate::model::family::Family;

pub const MAX_PIRLS_ITER: usize = 100;
const PIRLS_TOL: f64 = 1e-8;
const MIN_STEP: f64 = 1e-10;
const LAMBDA_GRID: usize = 41;
const LOG10_LAMBDA_MIN: f64 = -6.0;
const LOG10_LAMBDA_MAX: f64 = 6.0;
const SCALE_EPS: f64 = 1e-12;
const EIGEN_TOL: f64 = 1e-10;

/// Model matrix plus a penalty matrix with the same column layout.
#[derive(Debug, Clone)]
pub struct PenalizedDesign {
    pub x: DMatrix<f64>,
    pub penalty: DMatrix<f64>,
}

#[derive(Debug, Clone)]
pub struct PenalizedFit {
    pub beta: DVector<f64>,
    /// Bayesian posterior covariance of `beta`.
    pub vp: DMatrix<f64>,
    pub edf_per_coef: Vec<f64>,
    pub edf: f64,
    pub lambda: f64,
    pub scale: f64,
    pub deviance: f64,
    /// GCV for families with estimated scale, UBRE otherwise.
    pub score: f64,
    pub mu: Vec<f64>,
    pub eta: Vec<f64>,
    pub leverage: Vec<f64>,
    pub iterations: usize,
}

impl PenalizedFit {
    pub fn residual_df(&self) -> f64 {
        self.mu.len() as f64 - self.edf
    }
}

/// Fits a penalized GLM by PIRLS, choosing the smoothing parameter on a
/// log-spaced grid by GCV (estimated scale) or UBRE (known scale).
pub fn fit_penalized(
    design: &PenalizedDesign,
    y: &[f64],
    family: Family,
) -> Result<PenalizedFit, FitError> {
    let n = y.len();
    let p = design.x.ncols();
    if design.x.nrows() != n {
        return Err(FitError::Numerical(format!(
            "model matrix has {} rows for {} observations",
            design.x.nrows(),
            n
        )));
    }
    if n <= p {
        return Err(FitError::TooFewObservations {
            n_obs: n,
            required: p + 1,
        });
    }
    family.check_response(y)?;

    let xtx = design.x.tr_mul(&design.x);
    let s_norm = design.penalty.norm();
    let s = if s_norm > 0.0 {
        &design.penalty * (xtx.norm() / s_norm)
    } else {
        design.penalty.clone()
    };

    let mut best: Option<PenalizedFit> = None;
    let mut last_err = None;
    for step in 0..LAMBDA_GRID {
        let log10_lambda = LOG10_LAMBDA_MIN
            + (LOG10_LAMBDA_MAX - LOG10_LAMBDA_MIN) * step as f64 / (LAMBDA_GRID - 1) as f64;
        let lambda = 10f64.powf(log10_lambda);
        match pirls(&design.x, &s, y, family, lambda) {
            Ok(fit) => {
                if best.as_ref().is_none_or(|b| fit.score < b.score) {
                    best = Some(fit);
                }
            }
            Err(e) => last_err = Some(e),
        }
    }

    let Some(fit) = best else {
        return Err(last_err.unwrap_or(FitError::Singular));
    };
    if !family.known_scale() {
        let mean_sq = y.iter().map(|v| v * v).sum::<f64>() / n as f64;
        if !(fit.scale > SCALE_EPS * mean_sq) {
            return Err(FitError::ZeroScale);
        }
    }
    Ok(fit)
}

fn pirls(
    x: &DMatrix<f64>,
    s: &DMatrix<f64>,
    y: &[f64],
    family: Family,
    lambda: f64,
) -> Result<PenalizedFit, FitError> {
    let mut mu: Vec<f64> = y.iter().map(|v| family.init_mu(*v)).collect();
    let mut eta: Vec<f64> = mu.iter().map(|m| family.link(*m)).collect();
    if eta.iter().any(|e| !family.valid_eta(*e)) {
        return Err(FitError::InvalidPredictor);
    }

    let mut beta: Option<DVector<f64>> = None;
    let mut pdev_old = f64::INFINITY;

    for iter in 0..MAX_PIRLS_ITER {
        let (w, z) = working_response(family, y, &mu, &eta)?;
        let (xtwx, xtwz) = weighted_cross_products(x, &w, &z);
        let h = &xtwx + s * lambda;
        let chol = h.cholesky().ok_or(FitError::Singular)?;
        let proposal = chol.solve(&xtwz);

        let mut step = 1.0;
        let mut next = None;
        while step >= MIN_STEP {
            let candidate = match &beta {
                Some(old) => old + (&proposal - old) * step,
                None => proposal.clone(),
            };
            match evaluate(x, s, y, family, lambda, &candidate) {
                Some((eta_c, mu_c, pdev)) => {
                    if beta.is_none() || pdev <= pdev_old + PIRLS_TOL * (pdev_old.abs() + 0.1) {
                        next = Some((candidate, eta_c, mu_c, pdev));
                        break;
                    }
                }
                None => {
                    if beta.is_none() {
                        return Err(FitError::InvalidPredictor);
                    }
                }
            }
            step *= 0.5;
        }

        let Some((candidate, eta_c, mu_c, pdev)) = next else {
            // Step halving stalled: keep the last accepted iterate.
            let Some(b) = beta else {
                return Err(FitError::InvalidPredictor);
            };
            return finalize(x, s, y, family, lambda, b, eta, mu, iter);
        };

        let converged = (pdev_old - pdev).abs() < PIRLS_TOL * (pdev.abs() + 0.1);
        beta = Some(candidate);
        eta = eta_c;
        mu = mu_c;
        pdev_old = pdev;
        if converged {
            if let Some(b) = beta {
                return finalize(x, s, y, family, lambda, b, eta, mu, iter + 1);
            }
        }
    }

    Err(FitError::NotConverged(MAX_PIRLS_ITER))
}

fn evaluate(
    x: &DMatrix<f64>,
    s: &DMatrix<f64>,
    y: &[f64],
    family: Family,
    lambda: f64,
    beta: &DVector<f64>,
) -> Option<(Vec<f64>, Vec<f64>, f64)> {
    let eta_v = x * beta;
    let mut eta = Vec::with_capacity(eta_v.len());
    let mut mu = Vec::with_capacity(eta_v.len());
    for &e in eta_v.iter() {
        if !family.valid_eta(e) {
            return None;
        }
        let m = family.linkinv(e);
        if !family.valid_mu(m) {
            return None;
        }
        eta.push(e);
        mu.push(m);
    }
    let pdev = family.deviance(y, &mu) + lambda * beta.dot(&(s * beta));
    if !pdev.is_finite() {
        return None;
    }
    Some((eta, mu, pdev))
}

fn working_response(
    family: Family,
    y: &[f64],
    mu: &[f64],
    eta: &[f64],
) -> Result<(Vec<f64>, Vec<f64>), FitError> {
    let mut w = Vec::with_capacity(y.len());
    let mut z = Vec::with_capacity(y.len());
    for i in 0..y.len() {
        let d = family.mu_eta(eta[i]);
        let v = family.variance(mu[i]);
        if !(d.is_finite() && d != 0.0 && v.is_finite() && v > 0.0) {
            return Err(FitError::InvalidPredictor);
        }
        z.push(eta[i] + (y[i] - mu[i]) / d);
        w.push(d * d / v);
    }
    Ok((w, z))
}

fn weighted_cross_products(
    x: &DMatrix<f64>,
    w: &[f64],
    z: &[f64],
) -> (DMatrix<f64>, DVector<f64>) {
    let mut xw = x.clone();
    for i in 0..x.nrows() {
        for j in 0..x.ncols() {
            xw[(i, j)] *= w[i];
        }
    }
    let xtwx = xw.tr_mul(x);
    let xtwz = xw.tr_mul(&DVector::from_column_slice(z));
    (xtwx, xtwz)
}

#[allow(clippy::too_many_arguments)]
fn finalize(
    x: &DMatrix<f64>,
    s: &DMatrix<f64>,
    y: &[f64],
    family: Family,
    lambda: f64,
    beta: DVector<f64>,
    eta: Vec<f64>,
    mu: Vec<f64>,
    iterations: usize,
) -> Result<PenalizedFit, FitError> {
    let n = y.len();
    let p = x.ncols();
    let (w, z) = working_response(family, y, &mu, &eta)?;
    let (xtwx, _) = weighted_cross_products(x, &w, &z);
    let h = &xtwx + s * lambda;
    let chol = h.cholesky().ok_or(FitError::Singular)?;
    let h_inv = chol.inverse();

    let influence = &h_inv * &xtwx;
    let edf_per_coef: Vec<f64> = (0..p).map(|j| influence[(j, j)]).collect();
    let edf: f64 = edf_per_coef.iter().sum();

    let leverage: Vec<f64> = (0..n)
        .map(|i| {
            let xi = x.row(i).transpose();
            w[i] * xi.dot(&(&h_inv * &xi))
        })
        .collect();

    let deviance = family.deviance(y, &mu);
    let residual_df = n as f64 - edf;
    if residual_df <= 0.0 {
        return Err(FitError::TooFewObservations {
            n_obs: n,
            required: edf.ceil() as usize + 1,
        });
    }

    let scale = if family.known_scale() {
        1.0
    } else {
        let pearson: f64 = y
            .iter()
            .zip(mu.iter())
            .map(|(y, m)| (y - m).powi(2) / family.variance(*m))
            .sum();
        pearson / residual_df
    };

    let nf = n as f64;
    let score = if family.known_scale() {
        deviance / nf - 1.0 + 2.0 * edf / nf
    } else {
        nf * deviance / (residual_df * residual_df)
    };

    Ok(PenalizedFit {
        beta,
        vp: h_inv * scale,
        edf_per_coef,
        edf,
        lambda,
        scale,
        deviance,
        score,
        mu,
        eta,
        leverage,
        iterations,
    })
}

/// Wald-type test that the coefficients in `coef` are jointly zero, using
/// a rank truncated at the rounded effective degrees of freedom of the block.
pub fn block_p_value(
    fit: &PenalizedFit,
    coef: Range<usize>,
    known_scale: bool,
) -> Result<f64, FitError> {
    let m = coef.len();
    if m == 0 || coef.end > fit.beta.len() {
        return Err(FitError::Numerical("empty coefficient block".to_string()));
    }
    let beta = fit.beta.rows(coef.start, m).into_owned();
    let vp = fit.vp.view((coef.start, coef.start), (m, m)).into_owned();
    let block_edf: f64 = fit.edf_per_coef[coef.clone()].iter().sum();

    let eig = SymmetricEigen::new(vp);
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|a, b| {
        eig.eigenvalues[*b]
            .partial_cmp(&eig.eigenvalues[*a])
            .unwrap_or(Ordering::Equal)
    });
    let max_ev = eig.eigenvalues[order[0]];
    if !(max_ev > 0.0) {
        return Err(FitError::Numerical(
            "coefficient covariance is not positive".to_string(),
        ));
    }

    let rank = (block_edf.round() as usize).clamp(1, m);
    let mut stat = 0.0;
    let mut used = 0usize;
    for &idx in order.iter().take(rank) {
        let ev = eig.eigenvalues[idx];
        if ev <= max_ev * EIGEN_TOL {
            break;
        }
        let proj = eig.eigenvectors.column(idx).dot(&beta);
        stat += proj * proj / ev;
        used += 1;
    }
    let r = used.max(1) as f64;

    let p = if known_scale {
        let dist = ChiSquared::new(r).map_err(|e| FitError::Numerical(e.to_string()))?;
        1.0 - dist.cdf(stat)
    } else {
        let dist = FisherSnedecor::new(r, fit.residual_df())
            .map_err(|e| FitError::Numerical(e.to_string()))?;
        1.0 - dist.cdf(stat / r)
    };
    if !p.is_finite() {
        return Err(FitError::Numerical("test statistic is not finite".to_string()));
    }
    Ok(p.clamp(0.0, 1.0))
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/pirls.rs"]
mod tests;
