//! Single-variable coordinate ascent updates and full sweeps.

use crate::family::Linearizer;
use crate::linalg::column_axpy;
use crate::math::sigmoid;
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Variational factors `q_j = alpha_j N(mu_j, s_j) + (1 - alpha_j) δ0` of one grid point.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Factors {
    pub alpha: Array1<f64>,
    pub mu: Array1<f64>,
    pub s: Array1<f64>,
}

impl Factors {
    /// Posterior mean of every coefficient, `alpha ⊙ mu`.
    pub fn mean(&self) -> Array1<f64> {
        &self.alpha * &self.mu
    }
}

/// Direction of one sweep over the variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SweepOrder {
    Forward,
    Backward,
}

impl SweepOrder {
    /// Odd iterations (counting from one) sweep forward, even ones backward.
    pub fn for_iteration(iter: usize) -> Self {
        if iter % 2 == 1 {
            SweepOrder::Forward
        } else {
            SweepOrder::Backward
        }
    }
}

/// Moves variable `j` to its coordinate-wise optimum and applies the change of its
/// contribution to the fitted values `xr`.
#[inline]
pub(crate) fn update_variable<L: Linearizer>(
    x: &ArrayView2<f32>,
    lin: &L,
    j: usize,
    sa: f64,
    logodds: f64,
    factors: &mut Factors,
    xr: &mut Array1<f64>,
) {
    let r_old = factors.alpha[j] * factors.mu[j];
    let s = 1.0 / (lin.precision(j) + 1.0 / sa);
    let mu = s * lin.target(x, j, &xr.view(), r_old);
    let alpha = sigmoid(logodds + 0.5 * (s / sa).ln() + 0.5 * mu * mu / s);

    factors.s[j] = s;
    factors.mu[j] = mu;
    factors.alpha[j] = alpha;
    column_axpy(x, j, alpha * mu - r_old, xr);
}

/// One pass of [`update_variable`] over all variables in the given order.
pub(crate) fn sweep<L: Linearizer>(
    x: &ArrayView2<f32>,
    lin: &L,
    sa: f64,
    logodds: &ArrayView1<f64>,
    factors: &mut Factors,
    xr: &mut Array1<f64>,
    order: SweepOrder,
) {
    let p = x.ncols();
    match order {
        SweepOrder::Forward => {
            for j in 0..p {
                update_variable(x, lin, j, sa, logodds[j], factors, xr);
            }
        }
        SweepOrder::Backward => {
            for j in (0..p).rev() {
                update_variable(x, lin, j, sa, logodds[j], factors, xr);
            }
        }
    }
}
