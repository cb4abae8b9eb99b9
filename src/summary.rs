//! Model averaging over the grid points of a fit.
//!
//! Grid points are weighted by their normalized lower bounds, `w_i ∝ exp(logw_i)`,
//! which treats the bound as an approximation of the marginal likelihood under a
//! uniform prior over the grid.

use crate::error::{FitError, Result};
use crate::grid::{GridFit, best_index};
use crate::inner::GridPointFit;
use crate::linalg::matvec;
use crate::math::{normalize_log_weights, sigmoid};
use crate::options::Family;
use ndarray::{Array1, ArrayView2};

impl GridFit {
    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Normalized importance weights of the grid points.
    pub fn weights(&self) -> Vec<f64> {
        let logw: Vec<f64> = self.points.iter().map(|f| f.logw).collect();
        normalize_log_weights(&logw)
    }

    /// Index of the grid point with the largest lower bound.
    pub fn best_index(&self) -> usize {
        best_index(&self.points)
    }

    /// Fit with the largest lower bound.
    ///
    /// # Panics
    /// Panics if the fit holds no grid points.
    pub fn best(&self) -> &GridPointFit {
        &self.points[self.best_index()]
    }

    fn average<F>(&self, value: F) -> Array1<f64>
    where
        F: Fn(&GridPointFit) -> Array1<f64>,
    {
        let p = self.points.first().map_or(0, |f| f.alpha.len());
        self.points
            .iter()
            .zip(self.weights())
            .fold(Array1::zeros(p), |acc, (fit, w)| acc + value(fit) * w)
    }

    /// Posterior inclusion probabilities averaged over the grid.
    pub fn pip(&self) -> Array1<f64> {
        self.average(|f| f.alpha.clone())
    }

    /// Posterior mean coefficients `alpha ⊙ mu` averaged over the grid.
    pub fn beta(&self) -> Array1<f64> {
        self.average(|f| &f.alpha * &f.mu)
    }

    /// Model-averaged predictions for new samples: the expected response for the
    /// Gaussian family, the success probability for the binomial family.
    ///
    /// Gaussian predictions exclude covariate effects; add them back with
    /// [`crate::AdjustedData::covariate_effects`] when the fit used adjusted data.
    pub fn predict(&self, x: ArrayView2<f32>) -> Result<Array1<f64>> {
        let p = self.points.first().map_or(0, |f| f.alpha.len());
        if x.ncols() != p {
            return Err(FitError::ColumnMismatch {
                expected: p,
                found: x.ncols(),
            });
        }
        Ok(match self.family {
            Family::Gaussian => matvec(&x, &self.beta().view()),
            Family::Binomial => {
                let mut out = Array1::zeros(x.nrows());
                for (fit, w) in self.points.iter().zip(self.weights()) {
                    let b0 = fit.intercept.unwrap_or(0.0);
                    let eta = matvec(&x, &(&fit.alpha * &fit.mu).view());
                    out.zip_mut_with(&eta, |acc, &e| *acc += w * sigmoid(b0 + e));
                }
                out
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inner::TerminalState;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn point(
        logw: f64,
        alpha: Array1<f64>,
        mu: Array1<f64>,
        intercept: Option<f64>,
    ) -> GridPointFit {
        let p = alpha.len();
        GridPointFit {
            logw,
            sigma: 1.0,
            sa: 1.0,
            alpha,
            mu,
            s: Array1::from_elem(p, 0.1),
            eta: None,
            intercept,
            iterations: 3,
            alpha_change: 0.0,
            terminal: TerminalState::Converged,
            logw_trace: vec![logw],
        }
    }

    #[test]
    fn averages_follow_lower_bound_weights() {
        let fit = GridFit {
            family: Family::Gaussian,
            points: vec![
                point(-10.0, array![1.0, 0.0], array![2.0, 5.0], None),
                point(-10.0 + 3f64.ln(), array![0.5, 0.5], array![2.0, -1.0], None),
            ],
        };
        let w = fit.weights();
        assert_relative_eq!(w[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(w[1], 0.75, epsilon = 1e-12);
        assert_eq!(fit.best_index(), 1);

        let pip = fit.pip();
        assert_relative_eq!(pip[0], 0.25 + 0.75 * 0.5, epsilon = 1e-12);
        assert_relative_eq!(pip[1], 0.75 * 0.5, epsilon = 1e-12);
        let beta = fit.beta();
        assert_relative_eq!(beta[0], 0.25 * 2.0 + 0.75, epsilon = 1e-12);
        assert_relative_eq!(beta[1], -0.375, epsilon = 1e-12);

        let x = array![[1.0f32, 0.0], [0.0, 2.0]];
        let pred = fit.predict(x.view()).unwrap();
        assert_relative_eq!(pred[0], beta[0], epsilon = 1e-12);
        assert_relative_eq!(pred[1], 2.0 * beta[1], epsilon = 1e-12);
    }

    #[test]
    fn binomial_predictions_are_probabilities() {
        let fit = GridFit {
            family: Family::Binomial,
            points: vec![point(0.0, array![1.0], array![3.0], Some(-1.0))],
        };
        let x = array![[0.0f32], [1.0], [-1.0]];
        let pred = fit.predict(x.view()).unwrap();
        assert_relative_eq!(pred[0], sigmoid(-1.0), epsilon = 1e-12);
        assert_relative_eq!(pred[1], sigmoid(2.0), epsilon = 1e-12);
        assert_relative_eq!(pred[2], sigmoid(-4.0), epsilon = 1e-12);

        assert_eq!(
            fit.predict(array![[1.0f32, 2.0]].view()),
            Err(FitError::ColumnMismatch {
                expected: 1,
                found: 2
            })
        );
    }
}
