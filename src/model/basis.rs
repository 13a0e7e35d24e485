use nalgebra::{DMatrix, DVector};

use crate::model::FitError;

const DEGREE: usize = 3;

/// Cubic B-spline smooth with a second-order difference penalty and a
/// sum-to-zero constraint over the training covariate values.
///
/// The constraint is absorbed with a Householder reflection so the smooth
/// carries `k - 1` free coefficients. Outside `[lo, hi]` each basis function
/// is continued linearly from the boundary.
#[derive(Debug, Clone)]
pub struct SmoothBasis {
    k: usize,
    lo: f64,
    hi: f64,
    knots: Vec<f64>,
    z: DMatrix<f64>,
    penalty: DMatrix<f64>,
}

impl SmoothBasis {
    pub fn new(x_train: &[f64], k: usize) -> Result<Self, FitError> {
        if k < DEGREE + 1 {
            return Err(FitError::Numerical(format!(
                "basis dimension {k} is below the minimum of {}",
                DEGREE + 1
            )));
        }
        let lo = x_train.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = x_train.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(lo.is_finite() && hi.is_finite()) || hi - lo <= 0.0 {
            return Err(FitError::NoSpread);
        }

        let n_segments = k - DEGREE;
        let h = (hi - lo) / n_segments as f64;
        let knots: Vec<f64> = (0..k + DEGREE + 1)
            .map(|j| lo + (j as f64 - DEGREE as f64) * h)
            .collect();

        let mut basis = Self {
            k,
            lo,
            hi,
            knots,
            z: DMatrix::identity(k, k),
            penalty: DMatrix::zeros(k, k),
        };

        let raw = basis.raw_design(x_train);
        let n = x_train.len() as f64;
        let col_means = DVector::from_fn(k, |j, _| raw.column(j).sum() / n);
        basis.z = householder_null_space(&col_means);

        let d = difference_matrix(k);
        let s_raw = d.tr_mul(&d);
        basis.penalty = basis.z.tr_mul(&s_raw) * &basis.z;
        Ok(basis)
    }

    /// Number of free coefficients of the constrained smooth.
    pub fn n_coef(&self) -> usize {
        self.k - 1
    }

    pub fn penalty(&self) -> &DMatrix<f64> {
        &self.penalty
    }

    pub fn range(&self) -> (f64, f64) {
        (self.lo, self.hi)
    }

    /// Constrained design rows for `x`, one row per value.
    pub fn design(&self, x: &[f64]) -> DMatrix<f64> {
        self.raw_design(x) * &self.z
    }

    fn raw_design(&self, x: &[f64]) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(x.len(), self.k);
        for (i, &xi) in x.iter().enumerate() {
            let row = self.raw_row(xi);
            for (j, v) in row.into_iter().enumerate() {
                out[(i, j)] = v;
            }
        }
        out
    }

    fn raw_row(&self, x: f64) -> Vec<f64> {
        if x >= self.lo && x <= self.hi {
            return bspline_row(&self.knots, self.k, x, self.hi);
        }
        let delta = (self.hi - self.lo) * 1e-6;
        let (edge, inner) = if x < self.lo {
            (self.lo, self.lo + delta)
        } else {
            (self.hi, self.hi - delta)
        };
        let at_edge = bspline_row(&self.knots, self.k, edge, self.hi);
        let near = bspline_row(&self.knots, self.k, inner, self.hi);
        at_edge
            .iter()
            .zip(near.iter())
            .map(|(e, n)| {
                let slope = (e - n) / (edge - inner);
                e + slope * (x - edge)
            })
            .collect()
    }
}

fn bspline_row(knots: &[f64], k: usize, x: f64, hi: f64) -> Vec<f64> {
    let n_intervals = knots.len() - 1;
    let mut b = vec![0.0; n_intervals];
    if x >= hi {
        // Right boundary belongs to the last interior interval.
        b[k - 1] = 1.0;
    } else {
        for i in 0..n_intervals {
            if x >= knots[i] && x < knots[i + 1] {
                b[i] = 1.0;
                break;
            }
        }
    }
    for d in 1..=DEGREE {
        for i in 0..n_intervals - d {
            let left_den = knots[i + d] - knots[i];
            let right_den = knots[i + d + 1] - knots[i + 1];
            let left = if left_den > 0.0 {
                (x - knots[i]) / left_den * b[i]
            } else {
                0.0
            };
            let right = if right_den > 0.0 {
                (knots[i + d + 1] - x) / right_den * b[i + 1]
            } else {
                0.0
            };
            b[i] = left + right;
        }
    }
    b.truncate(k);
    b
}

fn difference_matrix(k: usize) -> DMatrix<f64> {
    let mut d = DMatrix::zeros(k - 2, k);
    for i in 0..k - 2 {
        d[(i, i)] = 1.0;
        d[(i, i + 1)] = -2.0;
        d[(i, i + 2)] = 1.0;
    }
    d
}

/// Columns 2..k of the Householder reflection that maps `c` onto the first
/// axis; they span the subspace orthogonal to `c`.
fn householder_null_space(c: &DVector<f64>) -> DMatrix<f64> {
    let k = c.len();
    let norm = c.norm();
    let alpha = if c[0] >= 0.0 { -norm } else { norm };
    let mut v = c.clone();
    v[0] -= alpha;
    let vtv = v.dot(&v);
    let mut h = DMatrix::identity(k, k);
    if vtv > 0.0 {
        h -= (&v * v.transpose()) * (2.0 / vtv);
    }
    h.columns(1, k - 1).into_owned()
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/basis.rs"]
mod tests;
