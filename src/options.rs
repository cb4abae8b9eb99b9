//! Immutable fit configuration, built once before the core runs.

use crate::error::{FitError, Result, ensure_positive};
use std::fmt;

/// Outcome family of the regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Linear regression with Gaussian residuals of variance σ.
    Gaussian,
    /// Logistic regression on a 0/1 response.
    Binomial,
}

impl Family {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Family::Gaussian => "gaussian",
            Family::Binomial => "binomial",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scaled inverse chi-square prior on the slab variance, used when `update_sa` is set.
///
/// The update is `sa = (sa0 n0 + Σ_j alpha_j (s_j + mu_j²)) / (n0 + Σ_j alpha_j)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlabPrior {
    /// Prior guess of the slab variance.
    pub sa0: f64,
    /// Prior sample size behind `sa0`.
    pub n0: f64,
}

impl Default for SlabPrior {
    fn default() -> Self {
        Self { sa0: 1.0, n0: 10.0 }
    }
}

/// Options for [`crate::run_grid`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Convergence tolerance on the largest change in any inclusion probability.
    pub tol: f64,
    /// Maximum number of sweeps per grid point.
    pub max_iter: usize,
    /// Re-estimate the residual variance after every sweep (Gaussian only).
    pub update_sigma: bool,
    /// Re-estimate the slab variance after every sweep.
    pub update_sa: bool,
    /// Optimize the logistic bound locations (binomial only; ignored for Gaussian).
    pub optimize_eta: bool,
    /// Prior used by the slab variance update.
    pub sa_prior: SlabPrior,
    /// Seed of the random initializations; grid point `i` draws from `seed + i`.
    pub seed: u64,
    /// Run the initial search pass when no initialization is supplied and the grid has
    /// more than one point.
    pub initial_search: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            tol: 1e-4,
            max_iter: 10_000,
            update_sigma: false,
            update_sa: false,
            optimize_eta: true,
            sa_prior: SlabPrior::default(),
            seed: 0,
            initial_search: true,
        }
    }
}

impl FitOptions {
    pub(crate) fn validate(&self, family: Family) -> Result<()> {
        ensure_positive("tol", self.tol)?;
        if self.max_iter == 0 {
            return Err(FitError::ZeroMaxIter);
        }
        if self.update_sigma && family == Family::Binomial {
            return Err(FitError::FamilyMismatch {
                option: "update_sigma",
                family: family.name(),
            });
        }
        if self.update_sa {
            ensure_positive("sa0", self.sa_prior.sa0)?;
            if !(self.sa_prior.n0.is_finite() && self.sa_prior.n0 >= 0.0) {
                return Err(FitError::InvalidParameter {
                    name: "n0",
                    value: self.sa_prior.n0,
                    reason: "must be non-negative and finite",
                });
            }
        }
        Ok(())
    }
}

/// Options for [`crate::run_mixture`].
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureOptions {
    /// Convergence tolerance on the largest change in any assignment probability.
    pub tol: f64,
    /// Maximum number of sweeps.
    pub max_iter: usize,
    /// Re-estimate the residual variance after every sweep.
    pub update_sigma: bool,
    /// Re-estimate the mixture weights after every sweep.
    pub update_q: bool,
    /// Dirichlet pseudo-counts added to the first component in the weight update.
    pub spike_penalty: f64,
    /// Starting residual variance; the sample variance of `y` when `None`.
    pub sigma: Option<f64>,
    /// Seed of the random initialization.
    pub seed: u64,
}

impl Default for MixtureOptions {
    fn default() -> Self {
        Self {
            tol: 1e-4,
            max_iter: 10_000,
            update_sigma: true,
            update_q: true,
            spike_penalty: 1.0,
            sigma: None,
            seed: 0,
        }
    }
}

impl MixtureOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        ensure_positive("tol", self.tol)?;
        if self.max_iter == 0 {
            return Err(FitError::ZeroMaxIter);
        }
        if !(self.spike_penalty.is_finite() && self.spike_penalty >= 0.0) {
            return Err(FitError::InvalidParameter {
                name: "spike_penalty",
                value: self.spike_penalty,
                reason: "must be non-negative and finite",
            });
        }
        if let Some(sigma) = self.sigma {
            ensure_positive("sigma", sigma)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_update_is_gaussian_only() {
        let opts = FitOptions {
            update_sigma: true,
            ..Default::default()
        };
        assert!(opts.validate(Family::Gaussian).is_ok());
        assert_eq!(
            opts.validate(Family::Binomial),
            Err(FitError::FamilyMismatch {
                option: "update_sigma",
                family: "binomial"
            })
        );
    }

    #[test]
    fn rejects_bad_tolerances() {
        let opts = FitOptions {
            tol: 0.0,
            ..Default::default()
        };
        assert!(opts.validate(Family::Gaussian).is_err());
        let opts = FitOptions {
            max_iter: 0,
            ..Default::default()
        };
        assert_eq!(opts.validate(Family::Gaussian), Err(FitError::ZeroMaxIter));
        let opts = MixtureOptions {
            spike_penalty: -1.0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
