//! Family-specific linearization of the likelihood.
//!
//! Every family reduces the single-variable update to the same form: an effective
//! precision `P_j` and an effective target `T_j`, from which
//! `s_j = 1 / (P_j + 1/sa)` and `mu_j = s_j T_j`. The Gaussian family is exact. The
//! binomial family replaces the logistic likelihood by the Jaakkola-Jordan quadratic
//! bound with one location `eta_i` per observation, and integrates out an intercept
//! with a flat prior.

use crate::bound;
use crate::linalg::{
    column_dot, column_sum_sq, matvec_t, weighted_column_dot, weighted_column_sum_sq,
};
use crate::math::polya_gamma_mean;
use ndarray::{Array1, ArrayView1, ArrayView2, Zip};

/// Quantities a coordinate update needs from the likelihood.
pub(crate) trait Linearizer {
    /// Effective precision contribution of variable `j`.
    fn precision(&self, j: usize) -> f64;

    /// Effective target of variable `j`, with the variable's own contribution
    /// `r_j = alpha_j mu_j` added back into the fit `xr`.
    fn target(&self, x: &ArrayView2<f32>, j: usize, xr: &ArrayView1<f64>, rj: f64) -> f64;

    /// Expected log-likelihood term of the lower bound, given the fit `xr` and the
    /// posterior variance of every coefficient.
    fn expected_log_likelihood(&self, xr: &ArrayView1<f64>, var: &ArrayView1<f64>) -> f64;
}

/// Sufficient statistics of the Gaussian family. They do not depend on any
/// variational parameter, so one copy is shared by every grid point.
#[derive(Debug, Clone)]
pub(crate) struct GaussianStats {
    /// `Σ_i X_ij²`
    pub d: Array1<f64>,
    /// `X_jᵗ y`
    pub xy: Array1<f64>,
}

impl GaussianStats {
    pub fn new(x: &ArrayView2<f32>, y: &ArrayView1<f64>) -> Self {
        Self {
            d: column_sum_sq(x),
            xy: matvec_t(x, y),
        }
    }

    /// Maximum-likelihood residual variance given the factors,
    /// `(‖y - Xr‖² + Σ_j d_j var_j) / n`.
    pub fn residual_variance(
        &self,
        y: &ArrayView1<f64>,
        xr: &ArrayView1<f64>,
        var: &ArrayView1<f64>,
    ) -> f64 {
        let rss: f64 = y.iter().zip(xr.iter()).map(|(a, b)| (a - b).powi(2)).sum();
        (rss + self.d.dot(var)) / y.len() as f64
    }
}

pub(crate) struct GaussianLinearizer<'a> {
    y: ArrayView1<'a, f64>,
    stats: &'a GaussianStats,
    sigma: f64,
}

impl<'a> GaussianLinearizer<'a> {
    pub fn new(y: ArrayView1<'a, f64>, stats: &'a GaussianStats, sigma: f64) -> Self {
        Self { y, stats, sigma }
    }
}

impl Linearizer for GaussianLinearizer<'_> {
    #[inline]
    fn precision(&self, j: usize) -> f64 {
        self.stats.d[j] / self.sigma
    }

    #[inline]
    fn target(&self, x: &ArrayView2<f32>, j: usize, xr: &ArrayView1<f64>, rj: f64) -> f64 {
        (self.stats.xy[j] - column_dot(x, j, xr) + self.stats.d[j] * rj) / self.sigma
    }

    fn expected_log_likelihood(&self, xr: &ArrayView1<f64>, var: &ArrayView1<f64>) -> f64 {
        bound::gaussian_log_likelihood(&self.y, xr, &self.stats.d.view(), var, self.sigma)
    }
}

/// Quadratic-bound statistics of the logistic likelihood at a fixed `eta`.
#[derive(Debug, Clone)]
pub(crate) struct BinomialLinearizer {
    /// `y - 1/2`
    yhat: Array1<f64>,
    eta: Array1<f64>,
    /// Bound curvatures `u_i = tanh(eta_i / 2) / (2 eta_i)`.
    u: Array1<f64>,
    sum_u: f64,
    /// `X_jᵗ u`
    xu: Array1<f64>,
    /// `Σ_i u_i X_ij² - (X_jᵗ u)² / Σu`
    d: Array1<f64>,
    /// `X_jᵗ yhat - (X_jᵗ u) Σyhat / Σu`
    xy: Array1<f64>,
}

impl BinomialLinearizer {
    pub fn new(x: &ArrayView2<f32>, y: &ArrayView1<f64>, eta: &ArrayView1<f64>) -> Self {
        let yhat = y.mapv(|yi| yi - 0.5);
        let u = eta.mapv(polya_gamma_mean);
        let sum_u = u.sum();
        let sum_yhat = yhat.sum();
        let xu = matvec_t(x, &u.view());
        let mut d = weighted_column_sum_sq(x, &u.view());
        Zip::from(&mut d).and(&xu).for_each(|dj, &xuj| {
            *dj = (*dj - xuj * xuj / sum_u).max(0.0);
        });
        let mut xy = matvec_t(x, &yhat.view());
        Zip::from(&mut xy)
            .and(&xu)
            .for_each(|xyj, &xuj| *xyj -= xuj * sum_yhat / sum_u);
        Self {
            yhat,
            eta: eta.to_owned(),
            u,
            sum_u,
            xu,
            d,
            xy,
        }
    }

    /// Posterior mean of the integrated-out intercept.
    pub fn intercept(&self, xr: &ArrayView1<f64>) -> f64 {
        (self.yhat.sum() - self.u.dot(xr)) / self.sum_u
    }

    /// Bound locations maximizing the lower bound for the current factors:
    /// `eta_i² = E[(beta0 + x_iᵗ b)²]` under the intercept posterior implied by the
    /// current curvatures.
    pub fn optimal_eta(
        &self,
        x: &ArrayView2<f32>,
        xr: &ArrayView1<f64>,
        var: &ArrayView1<f64>,
    ) -> Array1<f64> {
        let m0 = self.intercept(xr);
        let inv_u = 1.0 / self.sum_u;
        let mut second = Array1::from_elem(xr.len(), inv_u);
        for (j, &vj) in var.iter().enumerate() {
            if vj <= 0.0 {
                continue;
            }
            let shift = self.xu[j] * inv_u;
            Zip::from(&mut second)
                .and(x.column(j))
                .for_each(|acc, &xij| *acc += vj * (xij as f64 - shift).powi(2));
        }
        Zip::from(&second)
            .and(xr)
            .map_collect(|&extra, &xri| ((m0 + xri).powi(2) + extra).sqrt())
    }
}

impl Linearizer for BinomialLinearizer {
    #[inline]
    fn precision(&self, j: usize) -> f64 {
        self.d[j]
    }

    #[inline]
    fn target(&self, x: &ArrayView2<f32>, j: usize, xr: &ArrayView1<f64>, rj: f64) -> f64 {
        let u_xr = self.u.dot(xr);
        self.xy[j] - weighted_column_dot(x, j, &self.u.view(), xr)
            + self.xu[j] * u_xr / self.sum_u
            + self.d[j] * rj
    }

    fn expected_log_likelihood(&self, xr: &ArrayView1<f64>, var: &ArrayView1<f64>) -> f64 {
        bound::binomial_log_likelihood(
            &self.yhat.view(),
            &self.eta.view(),
            &self.u.view(),
            xr,
            &self.d.view(),
            var,
        )
    }
}

/// Closed dispatch over the supported families.
pub(crate) enum Linearization<'a> {
    Gaussian(GaussianLinearizer<'a>),
    Binomial(BinomialLinearizer),
}

impl Linearizer for Linearization<'_> {
    #[inline]
    fn precision(&self, j: usize) -> f64 {
        match self {
            Linearization::Gaussian(l) => l.precision(j),
            Linearization::Binomial(l) => l.precision(j),
        }
    }

    #[inline]
    fn target(&self, x: &ArrayView2<f32>, j: usize, xr: &ArrayView1<f64>, rj: f64) -> f64 {
        match self {
            Linearization::Gaussian(l) => l.target(x, j, xr, rj),
            Linearization::Binomial(l) => l.target(x, j, xr, rj),
        }
    }

    fn expected_log_likelihood(&self, xr: &ArrayView1<f64>, var: &ArrayView1<f64>) -> f64 {
        match self {
            Linearization::Gaussian(l) => l.expected_log_likelihood(xr, var),
            Linearization::Binomial(l) => l.expected_log_likelihood(xr, var),
        }
    }
}
