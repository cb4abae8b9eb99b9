//! Gaussian regression under a mixture-of-slabs prior.
//!
//! Each coefficient is drawn from one of `K` zero-mean normal components with fixed
//! variances `sa_1..sa_K` and mixture weights `q`. A component with variance zero is
//! an exact spike at zero. The variational posterior of coefficient `j` is
//! `Σ_k alpha_jk N(mu_jk, s_jk)` with `Σ_k alpha_jk = 1`.

use crate::bound::{LOG_EPS, mixture_lower_bound};
use crate::error::{FitError, Result, ensure_positive};
use crate::family::GaussianStats;
use crate::grid::validate_data;
use crate::inner::TerminalState;
use crate::linalg::{column_axpy, column_dot, matvec};
use crate::math::normalize_log_weights;
use crate::options::{Family, MixtureOptions};
use crate::rng::InitSampler;
use crate::step::SweepOrder;
use log::{debug, info, trace, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Component variances and starting weights of the mixture prior.
#[derive(Debug, Clone, PartialEq)]
pub struct MixturePrior {
    sa: Vec<f64>,
    q: Vec<f64>,
}

impl MixturePrior {
    /// `sa` holds the component variances (zero for a spike) and `q` the initial
    /// mixture weights, which must form a probability vector.
    ///
    /// # Example
    /// ```
    /// use spike_slab_vb::MixturePrior;
    /// let prior = MixturePrior::new(vec![0.0, 0.1, 1.0], vec![0.9, 0.05, 0.05]).unwrap();
    /// assert_eq!(prior.len(), 3);
    /// ```
    pub fn new(sa: Vec<f64>, q: Vec<f64>) -> Result<Self> {
        if q.len() != sa.len() {
            return Err(FitError::GridLength {
                name: "mixture weights",
                expected: sa.len(),
                found: q.len(),
            });
        }
        if sa.is_empty() {
            return Err(FitError::EmptyGrid);
        }
        if let Some(&bad) = sa.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
            return Err(FitError::InvalidParameter {
                name: "sa",
                value: bad,
                reason: "component variances must be non-negative and finite",
            });
        }
        let sum: f64 = q.iter().sum();
        if q.iter().any(|&w| !(w >= 0.0)) || (sum - 1.0).abs() > 1e-6 {
            return Err(FitError::InvalidWeights { sum });
        }
        Ok(Self { sa, q })
    }

    /// Equal weights over the given components.
    pub fn uniform(sa: Vec<f64>) -> Result<Self> {
        let k = sa.len().max(1);
        let q = vec![1.0 / k as f64; sa.len()];
        Self::new(sa, q)
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.sa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sa.is_empty()
    }

    pub fn variances(&self) -> &[f64] {
        &self.sa
    }

    pub fn weights(&self) -> &[f64] {
        &self.q
    }
}

/// Caller-supplied `p x K` starting assignment probabilities and means.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureInit {
    pub alpha: Array2<f64>,
    pub mu: Array2<f64>,
}

/// Result of [`run_mixture`].
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureFit {
    /// Final lower bound.
    pub logw: f64,
    /// Lower bound after every sweep.
    pub logw_trace: Vec<f64>,
    /// Largest change in any assignment probability at every sweep.
    pub err_trace: Vec<f64>,
    /// Residual variance.
    pub sigma: f64,
    /// Mixture weights.
    pub q: Vec<f64>,
    /// Component variances (fixed).
    pub sa: Vec<f64>,
    /// `p x K` assignment probabilities; rows sum to one.
    pub alpha: Array2<f64>,
    /// `p x K` component means.
    pub mu: Array2<f64>,
    /// `p x K` component variances.
    pub s: Array2<f64>,
    pub iterations: usize,
    pub terminal: TerminalState,
}

impl MixtureFit {
    /// Posterior mean of every coefficient, `Σ_k alpha_jk mu_jk`.
    pub fn posterior_mean(&self) -> Array1<f64> {
        (&self.alpha * &self.mu).sum_axis(Axis(1))
    }

    /// Posterior probability that each coefficient comes from a component with
    /// non-zero variance.
    pub fn slab_probability(&self) -> Array1<f64> {
        let mut out = Array1::zeros(self.alpha.nrows());
        for (k, &sak) in self.sa.iter().enumerate() {
            if sak > 0.0 {
                out += &self.alpha.column(k);
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
struct MixtureState {
    alpha: Array2<f64>,
    mu: Array2<f64>,
    s: Array2<f64>,
    xr: Array1<f64>,
    sigma: f64,
    q: Vec<f64>,
}

impl MixtureState {
    fn mean(&self) -> Array1<f64> {
        (&self.alpha * &self.mu).sum_axis(Axis(1))
    }

    fn variance(&self) -> Array1<f64> {
        let second = (&self.alpha * &(&self.s + &self.mu.mapv(|m| m * m))).sum_axis(Axis(1));
        let mean = self.mean();
        second - &mean * &mean
    }

    fn lower_bound(&self, y: &ArrayView1<f64>, stats: &GaussianStats, sa: &[f64]) -> f64 {
        mixture_lower_bound(
            y,
            &self.xr.view(),
            &stats.d.view(),
            &self.variance().view(),
            self.sigma,
            sa,
            &self.q,
            &self.alpha.view(),
            &self.mu.view(),
            &self.s.view(),
        )
    }
}

fn component_variance(d: f64, sigma: f64, sa: f64) -> f64 {
    if sa > 0.0 { 1.0 / (d / sigma + 1.0 / sa) } else { 0.0 }
}

/// Moves the factor of coefficient `j` to its coordinate-wise optimum.
fn update_variable(
    x: &ArrayView2<f32>,
    stats: &GaussianStats,
    sa: &[f64],
    log_q: &[f64],
    j: usize,
    state: &mut MixtureState,
) {
    let r_old = state.alpha.row(j).dot(&state.mu.row(j));
    let t = stats.xy[j] - column_dot(x, j, &state.xr.view()) + stats.d[j] * r_old;

    let mut logits = Vec::with_capacity(sa.len());
    for (k, &sak) in sa.iter().enumerate() {
        let sjk = component_variance(stats.d[j], state.sigma, sak);
        if sak > 0.0 {
            let mjk = sjk * t / state.sigma;
            state.s[[j, k]] = sjk;
            state.mu[[j, k]] = mjk;
            logits.push(log_q[k] + 0.5 * (sjk / sak).ln() + 0.5 * mjk * mjk / sjk);
        } else {
            state.s[[j, k]] = 0.0;
            state.mu[[j, k]] = 0.0;
            logits.push(log_q[k]);
        }
    }
    for (k, a) in normalize_log_weights(&logits).into_iter().enumerate() {
        state.alpha[[j, k]] = a;
    }

    let r_new = state.alpha.row(j).dot(&state.mu.row(j));
    column_axpy(x, j, r_new - r_old, &mut state.xr);
}

fn sweep(
    x: &ArrayView2<f32>,
    stats: &GaussianStats,
    sa: &[f64],
    state: &mut MixtureState,
    order: SweepOrder,
) {
    let log_q: Vec<f64> = state.q.iter().map(|&w| (w + LOG_EPS).ln()).collect();
    let p = x.ncols();
    match order {
        SweepOrder::Forward => (0..p).for_each(|j| update_variable(x, stats, sa, &log_q, j, state)),
        SweepOrder::Backward => {
            (0..p)
                .rev()
                .for_each(|j| update_variable(x, stats, sa, &log_q, j, state))
        }
    }
}

/// Penalized maximum a posteriori mixture weights: a Dirichlet prior adds `penalty`
/// pseudo-counts to the first component.
fn update_weights(alpha: &Array2<f64>, penalty: f64) -> Vec<f64> {
    let p = alpha.nrows() as f64;
    alpha
        .sum_axis(Axis(0))
        .iter()
        .enumerate()
        .map(|(k, &total)| (total + if k == 0 { penalty } else { 0.0 }) / (p + penalty))
        .collect()
}

fn initial_state(
    x: &ArrayView2<f32>,
    prior: &MixturePrior,
    init: Option<&MixtureInit>,
    sigma: f64,
    seed: u64,
) -> MixtureState {
    let (p, k) = (x.ncols(), prior.len());
    let (alpha, mut mu) = match init {
        Some(init) => (init.alpha.clone(), init.mu.clone()),
        None => {
            let sampler = InitSampler::new();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let alpha = sampler.simplex_rows(&mut rng, p, k);
            let mu = sampler
                .standard_normal(&mut rng, p * k)
                .into_shape_with_order((p, k))
                .unwrap_or_else(|_| Array2::zeros((p, k)));
            (alpha, mu)
        }
    };
    for (k, &sak) in prior.sa.iter().enumerate() {
        if sak == 0.0 {
            mu.column_mut(k).fill(0.0);
        }
    }
    let mean = (&alpha * &mu).sum_axis(Axis(1));
    MixtureState {
        xr: matvec(x, &mean.view()),
        s: Array2::zeros((p, k)),
        alpha,
        mu,
        sigma,
        q: prior.q.clone(),
    }
}

/// Fits the mixture-of-slabs model by coordinate ascent.
///
/// The convergence rule matches [`crate::run_grid`]: a sweep that lowers the bound is
/// rolled back and ends the fit, otherwise the fit stops once no assignment
/// probability moves by more than `tol`.
///
/// # Errors
/// Returns a [`FitError`] on inconsistent data, options or initialization.
pub fn run_mixture(
    x: ArrayView2<f32>,
    y: ArrayView1<f64>,
    prior: &MixturePrior,
    init: Option<&MixtureInit>,
    options: &MixtureOptions,
) -> Result<MixtureFit> {
    validate_data(&x, &y, Family::Gaussian)?;
    options.validate()?;
    let (p, k) = (x.ncols(), prior.len());
    if let Some(init) = init {
        for (name, m) in [("alpha", &init.alpha), ("mu", &init.mu)] {
            if m.dim() != (p, k) {
                return Err(FitError::InitShape {
                    name,
                    expected: (p, k),
                    found: m.dim(),
                });
            }
        }
        for row in init.alpha.rows() {
            let sum = row.sum();
            if row.iter().any(|&a| !(a >= 0.0)) || (sum - 1.0).abs() > 1e-6 {
                return Err(FitError::InvalidWeights { sum });
            }
        }
    }
    let sigma = match options.sigma {
        Some(sigma) => sigma,
        None => {
            let sigma = y.var(0.0);
            ensure_positive("sigma", sigma)?;
            sigma
        }
    };

    let stats = GaussianStats::new(&x, &y);
    let sa = prior.sa.as_slice();
    let mut state = initial_state(&x, prior, init, sigma, options.seed);
    Zip::indexed(&mut state.s).for_each(|(j, k), s| {
        *s = component_variance(stats.d[j], sigma, sa[k]);
    });
    info!("fitting a {k}-component mixture prior over {p} variables");

    let mut logw = f64::NEG_INFINITY;
    let mut logw_trace = Vec::new();
    let mut err_trace = Vec::new();
    let mut terminal = TerminalState::MaxIterReached;
    let mut iterations = 0;

    for iter in 1..=options.max_iter {
        iterations = iter;
        let snapshot = state.clone();
        let logw_prev = state.lower_bound(&y, &stats, sa);

        sweep(&x, &stats, sa, &mut state, SweepOrder::for_iteration(iter));
        let logw_cur = state.lower_bound(&y, &stats, sa);
        let err = Zip::from(&state.alpha)
            .and(&snapshot.alpha)
            .fold(0.0f64, |acc, &a, &b| acc.max((a - b).abs()));

        if logw_cur < logw_prev {
            trace!(
                "iter {iter}: lower bound fell from {logw_prev:.6} to {logw_cur:.6}, rolling back"
            );
            state = snapshot;
            logw = logw_prev;
            logw_trace.push(logw_prev);
            err_trace.push(0.0);
            terminal = TerminalState::Converged;
            break;
        }
        logw = logw_cur;
        logw_trace.push(logw_cur);
        err_trace.push(err);

        if options.update_sigma {
            state.sigma = stats.residual_variance(&y, &state.xr.view(), &state.variance().view());
        }
        if options.update_q {
            state.q = update_weights(&state.alpha, options.spike_penalty);
        }
        trace!(
            "iter {iter}: logw = {logw:.6}, max |Δalpha| = {err:.3e}, sigma = {:.4}, q = {:?}",
            state.sigma,
            state.q
        );
        if err < options.tol {
            terminal = TerminalState::Converged;
            break;
        }
    }
    if terminal == TerminalState::MaxIterReached {
        warn!("mixture fit stopped after {iterations} sweeps without converging");
    }
    debug!("mixture fit: {terminal:?} after {iterations} sweeps, logw = {logw:.6}");

    Ok(MixtureFit {
        logw,
        logw_trace,
        err_trace,
        sigma: state.sigma,
        q: state.q,
        sa: prior.sa.clone(),
        alpha: state.alpha,
        mu: state.mu,
        s: state.s,
        iterations,
        terminal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn data(n: usize, p: usize, seed: u64) -> (Array2<f32>, Array1<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let x = Array2::from_shape_fn((n, p), |_| 2.0 * rng.r#gen::<f32>() - 1.0);
        let y = Array1::from_shape_fn(n, |i| {
            1.5 * x[[i, 0]] as f64 + 0.2 * (rng.r#gen::<f64>() - 0.5)
        });
        (x, y)
    }

    #[test]
    fn weights_must_form_a_probability_vector() {
        assert!(matches!(
            MixturePrior::new(vec![0.0, 1.0], vec![0.5, 0.6]),
            Err(FitError::InvalidWeights { sum }) if (sum - 1.1).abs() < 1e-12
        ));
        assert!(MixturePrior::new(vec![-1.0, 1.0], vec![0.5, 0.5]).is_err());
        assert!(MixturePrior::new(vec![0.0, 1.0], vec![1.0]).is_err());
        let prior = MixturePrior::uniform(vec![0.0, 0.5, 2.0]).unwrap();
        assert_relative_eq!(prior.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn weight_update_counts_assignments() {
        let alpha = ndarray::array![[1.0, 0.0], [0.5, 0.5], [0.0, 1.0], [1.0, 0.0]];
        let q = update_weights(&alpha, 0.0);
        assert_relative_eq!(q[0], 2.5 / 4.0);
        assert_relative_eq!(q[1], 1.5 / 4.0);
        let q = update_weights(&alpha, 2.0);
        assert_relative_eq!(q[0], 4.5 / 6.0);
        assert_relative_eq!(q.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn assignments_stay_on_the_simplex_and_bound_rises() {
        let (x, y) = data(120, 12, 17);
        let prior = MixturePrior::new(vec![0.0, 0.01, 1.0], vec![0.6, 0.2, 0.2]).unwrap();
        // without a penalty the weight update maximizes the bound
        let opts = MixtureOptions {
            spike_penalty: 0.0,
            ..Default::default()
        };
        let fit = run_mixture(x.view(), y.view(), &prior, None, &opts).unwrap();
        for row in fit.alpha.rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
        for w in fit.logw_trace.windows(2) {
            assert!(w[1] >= w[0] - 1e-6 * w[0].abs().max(1.0), "trace decreased: {w:?}");
        }
        assert_eq!(fit.logw_trace.len(), fit.iterations);
        assert!(fit.slab_probability()[0] > 0.99);
        assert!(fit.posterior_mean()[0] > 1.2);
        assert!(fit.s.column(0).iter().all(|&s| s == 0.0));
        assert!(fit.s.column(2).iter().all(|&s| s > 0.0));
    }

    #[test]
    fn rollback_restores_the_previous_sweep() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let n = 100;
        let mut x = Array2::from_shape_fn((n, 3), |_| 2.0 * rng.r#gen::<f32>() - 1.0);
        for i in 0..n {
            x[[i, 1]] = x[[i, 0]] + 0.5 * (rng.r#gen::<f32>() - 0.5);
        }
        let y = Array1::from_shape_fn(n, |i| {
            0.4 * (x[[i, 0]] + x[[i, 1]]) as f64 + rng.r#gen::<f64>() - 0.5
        });
        let prior = MixturePrior::uniform(vec![0.1, 1.0]).unwrap();
        let opts = MixtureOptions {
            tol: 1e-300,
            max_iter: 5000,
            ..Default::default()
        };
        let fit = run_mixture(x.view(), y.view(), &prior, None, &opts).unwrap();
        let n = fit.logw_trace.len();
        assert_eq!(fit.terminal, TerminalState::Converged);
        assert_eq!(fit.err_trace.last(), Some(&0.0));
        assert!(fit.iterations >= 2 && n == fit.iterations);
        assert_eq!(fit.logw, fit.logw_trace[n - 1]);
        assert_eq!(fit.logw_trace[n - 1], fit.logw_trace[n - 2]);

        // same seed, same start: one sweep fewer reaches the restored state
        let previous = run_mixture(
            x.view(),
            y.view(),
            &prior,
            None,
            &MixtureOptions {
                max_iter: fit.iterations - 1,
                ..opts
            },
        )
        .unwrap();
        assert_eq!(previous.logw, fit.logw);
        assert_eq!(previous.alpha, fit.alpha);
        assert_eq!(previous.mu, fit.mu);
        assert_eq!(previous.s, fit.s);
        assert_eq!(previous.sigma, fit.sigma);
        assert_eq!(previous.q, fit.q);
    }

    #[test]
    fn initialization_shape_is_checked() {
        let (x, y) = data(20, 3, 1);
        let prior = MixturePrior::uniform(vec![0.0, 1.0]).unwrap();
        let init = MixtureInit {
            alpha: Array2::from_elem((3, 3), 1.0 / 3.0),
            mu: Array2::zeros((3, 2)),
        };
        assert_eq!(
            run_mixture(x.view(), y.view(), &prior, Some(&init), &MixtureOptions::default())
                .unwrap_err(),
            FitError::InitShape {
                name: "alpha",
                expected: (3, 2),
                found: (3, 3)
            }
        );
    }
}
