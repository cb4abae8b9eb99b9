//! Removal of unpenalized covariates before a Gaussian fit.
//!
//! Projecting `X` and `y` onto the orthogonal complement of `Z = [1 Z]` is equivalent
//! to giving the covariate effects a flat prior. The projection coefficients are kept
//! so that covariate effects can be recovered from the fitted coefficients.

use crate::error::{FitError, Result};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Relative size below which a pivot of `ZᵗZ` is treated as zero.
const PIVOT_TOL: f64 = 1e-10;

/// Factored covariate design `[1 Z]`.
#[derive(Debug, Clone)]
pub struct CovariateAdjustment {
    z: DMatrix<f64>,
    chol: Cholesky<f64, Dyn>,
}

/// Covariate-adjusted data together with the projection coefficients
/// `SZX = (ZᵗZ)⁻¹ZᵗX` and `SZy = (ZᵗZ)⁻¹Zᵗy`.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedData {
    pub x: Array2<f32>,
    pub y: Array1<f64>,
    pub szx: Array2<f64>,
    pub szy: Array1<f64>,
}

impl AdjustedData {
    /// Covariate effects (intercept first) implied by coefficients `beta` of the
    /// adjusted variables, `SZy - SZX beta`.
    pub fn covariate_effects(&self, beta: &ArrayView1<f64>) -> Array1<f64> {
        &self.szy - &self.szx.dot(beta)
    }
}

impl CovariateAdjustment {
    /// Factors `ZᵗZ` for an `n x m` covariate matrix; the intercept column is added.
    ///
    /// # Errors
    /// [`FitError::SingularCovariates`] when the covariates (with the intercept) are
    /// linearly dependent.
    pub fn new(z: ArrayView2<f64>) -> Result<Self> {
        let (n, m) = z.dim();
        let z = DMatrix::from_fn(n, m + 1, |i, k| if k == 0 { 1.0 } else { z[[i, k - 1]] });
        Self::factor(z)
    }

    /// Adjustment for the intercept alone, which centers `X` and `y`.
    pub fn intercept_only(n: usize) -> Result<Self> {
        Self::factor(DMatrix::from_element(n, 1, 1.0))
    }

    fn factor(z: DMatrix<f64>) -> Result<Self> {
        let ztz = z.tr_mul(&z);
        let scale = ztz.diagonal().iter().copied().fold(0.0, f64::max);
        let chol = Cholesky::new(ztz).ok_or(FitError::SingularCovariates)?;
        let pivots_ok = chol
            .l_dirty()
            .diagonal()
            .iter()
            .all(|&l| l.is_finite() && l * l > PIVOT_TOL * scale);
        if !pivots_ok {
            return Err(FitError::SingularCovariates);
        }
        Ok(Self { z, chol })
    }

    /// Number of covariate columns, including the intercept.
    pub fn num_covariates(&self) -> usize {
        self.z.ncols()
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.z.nrows()
    }

    /// Projects the covariates out of `x` and `y`.
    pub fn adjust(&self, x: ArrayView2<f32>, y: ArrayView1<f64>) -> Result<AdjustedData> {
        let n = self.num_samples();
        for (name, found) in [("design matrix", x.nrows()), ("response", y.len())] {
            if found != n {
                return Err(FitError::SampleCount {
                    name,
                    expected: n,
                    found,
                });
            }
        }
        let (p, m) = (x.ncols(), self.num_covariates());

        let y_vec = DVector::from_iterator(n, y.iter().copied());
        let szy = self.chol.solve(&self.z.tr_mul(&y_vec));
        let y_adj = &y_vec - &self.z * &szy;

        let mut x_adj = Array2::zeros((n, p));
        let mut szx = Array2::zeros((m, p));
        for j in 0..p {
            let col = DVector::from_iterator(n, x.column(j).iter().map(|&v| v as f64));
            let coef = self.chol.solve(&self.z.tr_mul(&col));
            let resid = &col - &self.z * &coef;
            x_adj
                .column_mut(j)
                .iter_mut()
                .zip(resid.iter())
                .for_each(|(dst, &r)| *dst = r as f32);
            szx.column_mut(j)
                .iter_mut()
                .zip(coef.iter())
                .for_each(|(dst, &c)| *dst = c);
        }

        Ok(AdjustedData {
            x: x_adj,
            y: Array1::from_iter(y_adj.iter().copied()),
            szx,
            szy: Array1::from_iter(szy.iter().copied()),
        })
    }
}
