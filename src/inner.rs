//! Coordinate ascent to convergence for one fixed hyperparameter setting.

use crate::bound::{prior_inclusion_term, spike_slab_kl};
use crate::family::{
    BinomialLinearizer, GaussianLinearizer, GaussianStats, Linearization, Linearizer,
};
use crate::linalg::matvec;
use crate::math::{coefficient_variance, max_abs_diff};
use crate::options::{Family, FitOptions, SlabPrior};
use crate::step::{Factors, SweepOrder, sweep};
use log::{debug, trace};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// How the optimization of one grid point ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// The largest change in inclusion probability fell below the tolerance, or a sweep
    /// decreased the lower bound and was rolled back.
    Converged,
    /// `max_iter` sweeps ran without meeting the tolerance. The last parameters are kept.
    MaxIterReached,
}

/// Converged variational fit at one grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPointFit {
    /// Variational lower bound on the log marginal likelihood.
    pub logw: f64,
    /// Residual variance (Gaussian; carried through unchanged for binomial).
    pub sigma: f64,
    /// Slab variance.
    pub sa: f64,
    /// Posterior inclusion probabilities.
    pub alpha: Array1<f64>,
    /// Posterior means of the coefficients given inclusion.
    pub mu: Array1<f64>,
    /// Posterior variances of the coefficients given inclusion.
    pub s: Array1<f64>,
    /// Logistic bound locations (binomial only).
    pub eta: Option<Array1<f64>>,
    /// Posterior mean of the integrated-out intercept (binomial only).
    pub intercept: Option<f64>,
    /// Number of sweeps performed.
    pub iterations: usize,
    /// Largest change in any inclusion probability during the last sweep; zero when the
    /// last sweep was rolled back.
    pub alpha_change: f64,
    /// How the optimization ended.
    pub terminal: TerminalState,
    /// Lower bound after every sweep.
    pub logw_trace: Vec<f64>,
}

/// Hyperparameters of one grid point, with log-odds broadcast to every variable.
#[derive(Debug, Clone)]
pub(crate) struct Hyperparameters {
    pub sigma: f64,
    pub sa: f64,
    pub logodds: Array1<f64>,
}

/// Where the optimization of one grid point starts.
#[derive(Debug, Clone)]
pub(crate) struct StartingPoint {
    pub alpha: Array1<f64>,
    pub mu: Array1<f64>,
    pub eta: Option<Array1<f64>>,
}

/// Read-only data shared by every grid point of a fit.
pub(crate) struct FitData<'a> {
    pub x: ArrayView2<'a, f32>,
    pub y: ArrayView1<'a, f64>,
    pub family: Family,
    gaussian: GaussianStats,
}

impl<'a> FitData<'a> {
    pub fn new(x: ArrayView2<'a, f32>, y: ArrayView1<'a, f64>, family: Family) -> Self {
        let gaussian = match family {
            Family::Gaussian => GaussianStats::new(&x, &y),
            // unused by the binomial family
            Family::Binomial => GaussianStats {
                d: Array1::zeros(0),
                xy: Array1::zeros(0),
            },
        };
        Self {
            x,
            y,
            family,
            gaussian,
        }
    }

    fn linearize(&self, state: &State) -> Linearization<'_> {
        match self.family {
            Family::Gaussian => Linearization::Gaussian(GaussianLinearizer::new(
                self.y.view(),
                &self.gaussian,
                state.sigma,
            )),
            Family::Binomial => Linearization::Binomial(BinomialLinearizer::new(
                &self.x,
                &self.y,
                &state.eta.view(),
            )),
        }
    }

    fn lower_bound(
        &self,
        lin: &Linearization<'_>,
        state: &State,
        logodds: &ArrayView1<f64>,
    ) -> f64 {
        let f = &state.factors;
        let var = coefficient_variance(&f.alpha.view(), &f.mu.view(), &f.s.view());
        lin.expected_log_likelihood(&state.xr.view(), &var.view())
            + spike_slab_kl(&f.alpha.view(), &f.mu.view(), &f.s.view(), state.sa)
            + prior_inclusion_term(&f.alpha.view(), logodds)
    }
}

#[derive(Debug, Clone)]
struct State {
    factors: Factors,
    xr: Array1<f64>,
    sigma: f64,
    sa: f64,
    /// Empty for the Gaussian family.
    eta: Array1<f64>,
}

fn update_slab_variance(factors: &Factors, prior: &SlabPrior) -> f64 {
    let Factors { alpha, mu, s } = factors;
    let second: f64 = alpha
        .iter()
        .zip(mu.iter().zip(s.iter()))
        .map(|(&a, (&m, &sj))| a * (sj + m * m))
        .sum();
    (prior.sa0 * prior.n0 + second) / (prior.n0 + alpha.sum())
}

/// Runs coordinate ascent for one grid point until convergence or `max_iter` sweeps.
pub(crate) fn optimize(
    data: &FitData<'_>,
    hyper: Hyperparameters,
    start: StartingPoint,
    options: &FitOptions,
) -> GridPointFit {
    let Hyperparameters { sigma, sa, logodds } = hyper;
    let p = data.x.ncols();
    let eta = match data.family {
        Family::Gaussian => Array1::zeros(0),
        Family::Binomial => start.eta.unwrap_or_else(|| Array1::ones(data.y.len())),
    };
    let factors = Factors {
        alpha: start.alpha,
        mu: start.mu,
        s: Array1::zeros(p),
    };
    let xr = matvec(&data.x, &factors.mean().view());
    let mut state = State {
        factors,
        xr,
        sigma,
        sa,
        eta,
    };
    {
        let lin = data.linearize(&state);
        for j in 0..p {
            state.factors.s[j] = 1.0 / (lin.precision(j) + 1.0 / sa);
        }
    }

    let mut logw = f64::NEG_INFINITY;
    let mut logw_trace = Vec::new();
    let mut alpha_change = f64::INFINITY;
    let mut terminal = TerminalState::MaxIterReached;
    let mut iterations = 0;

    for iter in 1..=options.max_iter {
        iterations = iter;
        let snapshot = state.clone();

        let mut lin = data.linearize(&state);
        let logw_prev = data.lower_bound(&lin, &state, &logodds.view());

        let new_eta = match &lin {
            Linearization::Binomial(b) if options.optimize_eta => {
                let f = &state.factors;
                let var = coefficient_variance(&f.alpha.view(), &f.mu.view(), &f.s.view());
                Some(b.optimal_eta(&data.x, &state.xr.view(), &var.view()))
            }
            _ => None,
        };
        if let Some(eta) = new_eta {
            state.eta = eta;
            lin = data.linearize(&state);
        }

        sweep(
            &data.x,
            &lin,
            state.sa,
            &logodds.view(),
            &mut state.factors,
            &mut state.xr,
            SweepOrder::for_iteration(iter),
        );
        let logw_cur = data.lower_bound(&lin, &state, &logodds.view());
        alpha_change = max_abs_diff(&state.factors.alpha.view(), &snapshot.factors.alpha.view());

        if logw_cur < logw_prev {
            trace!(
                "iter {iter}: lower bound fell from {logw_prev:.6} to {logw_cur:.6}, rolling back"
            );
            state = snapshot;
            logw = logw_prev;
            logw_trace.push(logw_prev);
            alpha_change = 0.0;
            terminal = TerminalState::Converged;
            break;
        }
        logw = logw_cur;
        logw_trace.push(logw_cur);

        if options.update_sigma {
            let f = &state.factors;
            let var = coefficient_variance(&f.alpha.view(), &f.mu.view(), &f.s.view());
            state.sigma = data
                .gaussian
                .residual_variance(&data.y, &state.xr.view(), &var.view());
        }
        if options.update_sa {
            state.sa = update_slab_variance(&state.factors, &options.sa_prior);
        }

        trace!(
            "iter {iter}: logw = {logw:.6}, max |Δalpha| = {alpha_change:.3e}, \
             sigma = {:.4}, sa = {:.4}",
            state.sigma,
            state.sa
        );
        if alpha_change < options.tol {
            terminal = TerminalState::Converged;
            break;
        }
    }
    debug!("{terminal:?} after {iterations} sweeps, logw = {logw:.6}");

    let State {
        factors,
        xr,
        sigma,
        sa,
        eta,
    } = state;
    let (eta, intercept) = match data.family {
        Family::Gaussian => (None, None),
        Family::Binomial => {
            let lin = BinomialLinearizer::new(&data.x, &data.y, &eta.view());
            let b0 = lin.intercept(&xr.view());
            (Some(eta), Some(b0))
        }
    };

    GridPointFit {
        logw,
        sigma,
        sa,
        alpha: factors.alpha,
        mu: factors.mu,
        s: factors.s,
        eta,
        intercept,
        iterations,
        alpha_change,
        terminal,
        logw_trace,
    }
}
