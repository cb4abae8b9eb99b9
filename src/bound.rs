//! Variational lower bounds (ELBO).
//!
//! The bound of a single-component fit is the family's expected log-likelihood plus
//! [`spike_slab_kl`] plus [`prior_inclusion_term`]. The mixture prior has its own
//! closed form in [`mixture_lower_bound`].

use crate::math::log_sigmoid;
use ndarray::{ArrayView1, ArrayView2};
use std::f64::consts::PI;

/// Added inside logarithms of probabilities that may reach zero.
pub(crate) const LOG_EPS: f64 = f64::EPSILON;

/// `E[ln N(y; Xb, σ I)]` under the factorized posterior.
pub(crate) fn gaussian_log_likelihood(
    y: &ArrayView1<f64>,
    xr: &ArrayView1<f64>,
    d: &ArrayView1<f64>,
    var: &ArrayView1<f64>,
    sigma: f64,
) -> f64 {
    let n = y.len() as f64;
    let rss: f64 = y.iter().zip(xr.iter()).map(|(a, b)| (a - b).powi(2)).sum();
    -0.5 * n * (2.0 * PI * sigma).ln() - rss / (2.0 * sigma) - d.dot(var) / (2.0 * sigma)
}

/// Expectation of the logistic quadratic bound, with a flat-prior intercept
/// integrated out.
pub(crate) fn binomial_log_likelihood(
    yhat: &ArrayView1<f64>,
    eta: &ArrayView1<f64>,
    u: &ArrayView1<f64>,
    xr: &ArrayView1<f64>,
    d: &ArrayView1<f64>,
    var: &ArrayView1<f64>,
) -> f64 {
    let sum_u = u.sum();
    let sum_yhat = yhat.sum();
    let u_xr = u.dot(xr);

    let at_eta: f64 = eta
        .iter()
        .zip(u.iter())
        .map(|(&e, &ui)| log_sigmoid(e) - 0.5 * e + 0.5 * ui * e * e)
        .sum();
    let quad: f64 = u.iter().zip(xr.iter()).map(|(&ui, &r)| ui * r * r).sum();

    at_eta + 0.5 * (2.0 * PI / sum_u).ln() + sum_yhat * sum_yhat / (2.0 * sum_u) + yhat.dot(xr)
        - sum_yhat * u_xr / sum_u
        - 0.5 * quad
        + u_xr * u_xr / (2.0 * sum_u)
        - 0.5 * d.dot(var)
}

/// Negative KL divergence of the spike-and-slab factors from the slab prior
/// `N(0, sa)`, including the entropy of the inclusion indicators.
pub(crate) fn spike_slab_kl(
    alpha: &ArrayView1<f64>,
    mu: &ArrayView1<f64>,
    s: &ArrayView1<f64>,
    sa: f64,
) -> f64 {
    let mut total = 0.0;
    for ((&a, &m), &sj) in alpha.iter().zip(mu.iter()).zip(s.iter()) {
        total += 0.5 * a * (1.0 + (sj / sa).ln() - (sj + m * m) / sa);
        total -= a * (a + LOG_EPS).ln() + (1.0 - a) * (1.0 - a + LOG_EPS).ln();
    }
    total
}

/// `E[ln p(γ)]` for independent inclusion indicators with prior log-odds `logodds`.
pub(crate) fn prior_inclusion_term(alpha: &ArrayView1<f64>, logodds: &ArrayView1<f64>) -> f64 {
    alpha
        .iter()
        .zip(logodds.iter())
        .map(|(&a, &lo)| (a - 1.0) * lo + log_sigmoid(lo))
        .sum()
}

/// Lower bound of the Gaussian model under a mixture-of-slabs prior with fixed
/// component variances `sa` and weights `q`. Components with `sa_k = 0` are exact
/// spikes and contribute no slab term.
#[allow(clippy::too_many_arguments)]
pub(crate) fn mixture_lower_bound(
    y: &ArrayView1<f64>,
    xr: &ArrayView1<f64>,
    d: &ArrayView1<f64>,
    var: &ArrayView1<f64>,
    sigma: f64,
    sa: &[f64],
    q: &[f64],
    alpha: &ArrayView2<f64>,
    mu: &ArrayView2<f64>,
    s: &ArrayView2<f64>,
) -> f64 {
    let mut total = gaussian_log_likelihood(y, xr, d, var, sigma);
    for (k, (&sak, &qk)) in sa.iter().zip(q).enumerate() {
        let log_q = (qk + LOG_EPS).ln();
        for j in 0..alpha.nrows() {
            let a = alpha[[j, k]];
            total += a * log_q - a * (a + LOG_EPS).ln();
            if sak > 0.0 {
                let (m, sjk) = (mu[[j, k]], s[[j, k]]);
                total += 0.5 * a * (1.0 + (sjk / sak).ln() - (sjk + m * m) / sak);
            }
        }
    }
    total
}
