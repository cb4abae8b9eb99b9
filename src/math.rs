//! Scalar helpers shared by the updates and the lower bounds.

use ndarray::{Array1, ArrayView1};

/// Logistic function, evaluated without overflow for arguments of any magnitude.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln σ(x)`, stable in both tails.
#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

/// Mean of a Pólya-Gamma PG(1, c) variate, `tanh(c/2) / (2c)`.
///
/// This is the curvature of the Jaakkola-Jordan quadratic bound on the logistic
/// log-likelihood at the bound location `c`. The limit at `c = 0` is `1/4`.
#[inline]
pub fn polya_gamma_mean(c: f64) -> f64 {
    let c = c.abs();
    if c < 1e-6 {
        // Taylor expansion around zero
        0.25 - c * c / 48.0
    } else {
        (0.5 * c).tanh() / (2.0 * c)
    }
}

/// Normalizes log-weights into probabilities, `exp(w - logsumexp(w))`.
pub fn normalize_log_weights(logw: &[f64]) -> Vec<f64> {
    let max = logw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let w: Vec<f64> = logw.iter().map(|&l| (l - max).exp()).collect();
    let total: f64 = w.iter().sum();
    w.into_iter().map(|v| v / total).collect()
}

/// Largest absolute elementwise difference.
pub fn max_abs_diff(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Posterior variance of each coefficient under `alpha N(mu, s) + (1 - alpha) δ0`.
pub fn coefficient_variance(
    alpha: &ArrayView1<f64>,
    mu: &ArrayView1<f64>,
    s: &ArrayView1<f64>,
) -> Array1<f64> {
    let mut var = Array1::zeros(alpha.len());
    for (j, v) in var.iter_mut().enumerate() {
        let r = alpha[j] * mu[j];
        *v = alpha[j] * (s[j] + mu[j] * mu[j]) - r * r;
    }
    var
}
