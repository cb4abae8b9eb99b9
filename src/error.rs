//! Configuration errors surfaced before any iteration begins.
//!
//! Numerical non-convergence and lower-bound regressions are not errors: they are
//! reported through [`crate::TerminalState`] on each fit.

use thiserror::Error;

/// Errors returned by the fitting entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// `X` and `y` disagree on the number of samples.
    #[error("design matrix has {rows} rows but the response has {len} entries")]
    DimensionMismatch { rows: usize, len: usize },

    /// Data passed for adjustment do not match the covariate matrix's sample count.
    #[error("{name} has {found} samples, expected {expected}")]
    SampleCount {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    /// The design matrix has no samples or no variables.
    #[error("design matrix must be non-empty, got {rows}x{cols}")]
    EmptyDesign { rows: usize, cols: usize },

    /// New data do not have the number of variables the model was fitted on.
    #[error("expected {expected} variables, found {found}")]
    ColumnMismatch { expected: usize, found: usize },

    /// The hyperparameter grid has no points.
    #[error("hyperparameter grid is empty")]
    EmptyGrid,

    /// One of the grid vectors does not have one entry per grid point.
    #[error("grid {name} has {found} entries, expected {expected}")]
    GridLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    /// Per-variable log-odds do not have one row per variable.
    #[error("per-variable log-odds have {found} rows, expected {expected}")]
    LogOddsRows { expected: usize, found: usize },

    /// A scalar parameter is outside its admissible range.
    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// `max_iter` must be at least one.
    #[error("max_iter must be at least 1")]
    ZeroMaxIter,

    /// The binomial family needs a 0/1 response.
    #[error("binomial response must be 0 or 1, found {value} at index {index}")]
    NonBinaryResponse { index: usize, value: f64 },

    /// An option that the chosen family cannot honor.
    #[error("{option} is not available for the {family} family")]
    FamilyMismatch {
        option: &'static str,
        family: &'static str,
    },

    /// A caller-supplied initialization has the wrong shape.
    #[error("initial {name} has shape {found:?}, expected {expected:?}")]
    InitShape {
        name: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Mixture weights must be a probability vector over the components.
    #[error("mixture weights must be non-negative and sum to one (sum = {sum})")]
    InvalidWeights { sum: f64 },

    /// The covariate cross-product `Z'Z` is not positive definite.
    #[error("covariate cross-product is singular")]
    SingularCovariates,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FitError>;

pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FitError::InvalidParameter {
            name,
            value,
            reason: "must be positive and finite",
        })
    }
}
