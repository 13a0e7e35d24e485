use nalgebra::DMatrix;
use serde::Serialize;

use crate::model::FitError;
use crate::model::basis::SmoothBasis;
use crate::model::family::Family;
use crate::model::pirls::{PenalizedDesign, PenalizedFit, block_p_value, fit_penalized};
use crate::model::stats::{has_temporal_autocorrelation, ks_normal_p_value, mean};

/// Two-sided pointwise interval multiplier.
pub const CI_Z: f64 = 1.96;

/// `y ~ s(x, k)`: one intercept plus one penalized cubic smooth.
#[derive(Debug, Clone)]
pub struct SmoothFit {
    family: Family,
    basis: SmoothBasis,
    fit: PenalizedFit,
    y: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionPoint {
    pub pred: f64,
    pub ci_low: f64,
    pub ci_up: f64,
    pub se_link: f64,
}

/// Per-model summary statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitSummary {
    pub n_obs: usize,
    pub edf: f64,
    pub p_val: f64,
    pub r_sq: Option<f64>,
    pub expl_dev: Option<f64>,
    pub aic: f64,
    pub ks_test: Option<f64>,
    pub tac: bool,
    pub max_cooks: f64,
}

impl SmoothFit {
    /// Fits the smooth to paired observations. Callers drop missing values
    /// beforehand; `x` should be in time order for the residual checks.
    pub fn fit(x: &[f64], y: &[f64], k: usize, family: Family) -> Result<Self, FitError> {
        if x.len() != y.len() {
            return Err(FitError::Numerical(format!(
                "covariate has {} values, response has {}",
                x.len(),
                y.len()
            )));
        }
        if x.len() < k + 1 {
            return Err(FitError::TooFewObservations {
                n_obs: x.len(),
                required: k + 1,
            });
        }
        let basis = SmoothBasis::new(x, k)?;
        let design = smooth_design(&basis, x);
        let fit = fit_penalized(&design, y, family)?;
        Ok(Self {
            family,
            basis,
            fit,
            y: y.to_vec(),
        })
    }

    pub fn n_obs(&self) -> usize {
        self.y.len()
    }

    pub fn edf(&self) -> f64 {
        self.fit.edf
    }

    /// Effective degrees of freedom of the smooth term alone.
    pub fn smooth_edf(&self) -> f64 {
        self.fit.edf_per_coef[1..].iter().sum()
    }

    pub fn scale(&self) -> f64 {
        self.fit.scale
    }

    pub fn deviance(&self) -> f64 {
        self.fit.deviance
    }

    /// GCV or UBRE score at the selected smoothing parameter.
    pub fn score(&self) -> f64 {
        self.fit.score
    }

    pub fn fitted(&self) -> &[f64] {
        &self.fit.mu
    }

    /// p-value of the test that the smooth term is zero.
    pub fn p_value(&self) -> Result<f64, FitError> {
        block_p_value(
            &self.fit,
            1..self.fit.beta.len(),
            self.family.known_scale(),
        )
    }

    pub fn predict(&self, x: &[f64]) -> Vec<PredictionPoint> {
        let xm = with_intercept(&self.basis.design(x));
        (0..xm.nrows())
            .map(|i| {
                let row = xm.row(i).transpose();
                let eta = row.dot(&self.fit.beta);
                let var = row.dot(&(&self.fit.vp * &row)).max(0.0);
                let se = var.sqrt();
                let pred = self.family.linkinv(eta);
                let a = self.family.linkinv(eta - CI_Z * se);
                let b = self.family.linkinv(eta + CI_Z * se);
                PredictionPoint {
                    pred,
                    ci_low: a.min(b).min(pred),
                    ci_up: a.max(b).max(pred),
                    se_link: se,
                }
            })
            .collect()
    }

    /// Pearson residuals scaled by the estimated dispersion.
    pub fn standardized_residuals(&self) -> Vec<f64> {
        let scale = self.fit.scale;
        self.y
            .iter()
            .zip(self.fit.mu.iter())
            .map(|(y, m)| (y - m) / (self.family.variance(*m) * scale).sqrt())
            .collect()
    }

    pub fn cooks_distances(&self) -> Vec<f64> {
        let edf = self.fit.edf;
        self.standardized_residuals()
            .iter()
            .zip(self.fit.leverage.iter())
            .map(|(r, h)| {
                if *h >= 1.0 {
                    return f64::INFINITY;
                }
                r * r * h / (edf * (1.0 - h).powi(2))
            })
            .collect()
    }

    pub fn null_deviance(&self) -> f64 {
        let ybar = mean(&self.y);
        self.y
            .iter()
            .map(|y| self.family.dev_resid(*y, ybar))
            .sum()
    }

    pub fn explained_deviance(&self) -> Option<f64> {
        let null = self.null_deviance();
        if null > 0.0 {
            Some((null - self.fit.deviance) / null)
        } else {
            None
        }
    }

    /// Adjusted R² on the response scale.
    pub fn r_squared_adj(&self) -> Option<f64> {
        let n = self.y.len() as f64;
        let resid: Vec<f64> = self
            .y
            .iter()
            .zip(self.fit.mu.iter())
            .map(|(y, m)| y - m)
            .collect();
        let var_y = variance(&self.y);
        if var_y <= 0.0 {
            return None;
        }
        Some(1.0 - variance(&resid) * (n - 1.0) / (var_y * self.fit.residual_df()))
    }

    pub fn aic(&self) -> f64 {
        let extra = if self.family.known_scale() { 0.0 } else { 1.0 };
        self.family
            .neg2_loglik(&self.y, &self.fit.mu, self.fit.scale)
            + 2.0 * (self.fit.edf + extra)
    }

    pub fn summary(&self) -> Result<FitSummary, FitError> {
        let residuals = self.standardized_residuals();
        Ok(FitSummary {
            n_obs: self.n_obs(),
            edf: self.smooth_edf(),
            p_val: self.p_value()?,
            r_sq: self.r_squared_adj(),
            expl_dev: self.explained_deviance(),
            aic: self.aic(),
            ks_test: ks_normal_p_value(&residuals),
            tac: has_temporal_autocorrelation(&residuals),
            max_cooks: self
                .cooks_distances()
                .into_iter()
                .fold(0.0, f64::max),
        })
    }
}

pub fn smooth_design(basis: &SmoothBasis, x: &[f64]) -> PenalizedDesign {
    let xm = with_intercept(&basis.design(x));
    let p = xm.ncols();
    let mut penalty = DMatrix::zeros(p, p);
    let s = basis.penalty();
    for i in 0..s.nrows() {
        for j in 0..s.ncols() {
            penalty[(i + 1, j + 1)] = s[(i, j)];
        }
    }
    PenalizedDesign { x: xm, penalty }
}

pub fn with_intercept(smooth: &DMatrix<f64>) -> DMatrix<f64> {
    let n = smooth.nrows();
    let m = smooth.ncols();
    DMatrix::from_fn(n, m + 1, |i, j| if j == 0 { 1.0 } else { smooth[(i, j - 1)] })
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/gam.rs"]
mod tests;
