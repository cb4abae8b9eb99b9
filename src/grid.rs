//! Hyperparameter grid orchestration.
//!
//! Every grid point is optimized independently from read-only data. When the grid has
//! more than one point and no starting point was supplied, a search pass optimizes
//! every point from its own random start, and the converged factors of the point with
//! the largest lower bound are then used as the shared start of a second pass over all
//! points. Sharing the start keeps the lower bounds of different grid points
//! comparable.

use crate::error::{FitError, Result, ensure_positive};
use crate::inner::{FitData, GridPointFit, Hyperparameters, StartingPoint, TerminalState, optimize};
use crate::linalg::column_var;
use crate::options::{Family, FitOptions};
use crate::rng::InitSampler;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Prior log-odds of inclusion over the grid.
#[derive(Debug, Clone, PartialEq)]
pub enum LogOdds {
    /// One value per grid point, shared by every variable.
    Shared(Vec<f64>),
    /// A `p x ns` matrix with one value per variable and grid point.
    PerVariable(Array2<f64>),
}

impl LogOdds {
    /// Number of grid points.
    pub fn len(&self) -> usize {
        match self {
            LogOdds::Shared(v) => v.len(),
            LogOdds::PerVariable(m) => m.ncols(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn column(&self, i: usize, p: usize) -> Array1<f64> {
        match self {
            LogOdds::Shared(v) => Array1::from_elem(p, v[i]),
            LogOdds::PerVariable(m) => m.column(i).to_owned(),
        }
    }
}

/// An ordered sequence of hyperparameter settings `(sigma, sa, logodds)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    sigma: Vec<f64>,
    sa: Vec<f64>,
    logodds: LogOdds,
}

impl Grid {
    /// Builds a grid from one residual variance, slab variance and log-odds setting per
    /// grid point. The residual variances are ignored by the binomial family.
    pub fn new(sigma: Vec<f64>, sa: Vec<f64>, logodds: LogOdds) -> Result<Self> {
        let ns = logodds.len();
        if ns == 0 {
            return Err(FitError::EmptyGrid);
        }
        for (name, found) in [("sigma", sigma.len()), ("sa", sa.len())] {
            if found != ns {
                return Err(FitError::GridLength {
                    name,
                    expected: ns,
                    found,
                });
            }
        }
        Ok(Self { sigma, sa, logodds })
    }

    /// A grid over shared log-odds with the residual and slab variances fixed.
    ///
    /// # Example
    /// ```
    /// use spike_slab_vb::Grid;
    /// let grid = Grid::with_logodds(1.0, 0.5, vec![-3.0, -2.0, -1.0]).unwrap();
    /// assert_eq!(grid.len(), 3);
    /// ```
    pub fn with_logodds(sigma: f64, sa: f64, logodds: Vec<f64>) -> Result<Self> {
        let ns = logodds.len();
        Self::new(vec![sigma; ns], vec![sa; ns], LogOdds::Shared(logodds))
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.logodds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logodds.is_empty()
    }

    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    pub fn sa(&self) -> &[f64] {
        &self.sa
    }

    pub fn logodds(&self) -> &LogOdds {
        &self.logodds
    }

    fn validate(&self, p: usize, family: Family) -> Result<()> {
        if let LogOdds::PerVariable(m) = &self.logodds {
            if m.nrows() != p {
                return Err(FitError::LogOddsRows {
                    expected: p,
                    found: m.nrows(),
                });
            }
        }
        for &sa in &self.sa {
            ensure_positive("sa", sa)?;
        }
        if family == Family::Gaussian {
            for &sigma in &self.sigma {
                ensure_positive("sigma", sigma)?;
            }
        }
        Ok(())
    }

    pub(crate) fn hyperparameters(&self, i: usize, p: usize) -> Hyperparameters {
        Hyperparameters {
            sigma: self.sigma[i],
            sa: self.sa[i],
            logodds: self.logodds.column(i, p),
        }
    }
}

/// Caller-supplied starting point. Each matrix has either one column per grid point or
/// a single column shared by all grid points.
#[derive(Debug, Clone, PartialEq)]
pub struct Initialization {
    /// `p x ns` (or `p x 1`) inclusion probabilities.
    pub alpha: Array2<f64>,
    /// `p x ns` (or `p x 1`) slab means.
    pub mu: Array2<f64>,
    /// `n x ns` (or `n x 1`) logistic bound locations; ones when absent.
    pub eta: Option<Array2<f64>>,
}

impl Initialization {
    fn validate(&self, n: usize, p: usize, ns: usize) -> Result<()> {
        let check = |name: &'static str, m: &Array2<f64>, rows: usize| {
            let (r, c) = m.dim();
            if r != rows || (c != ns && c != 1) {
                Err(FitError::InitShape {
                    name,
                    expected: (rows, ns),
                    found: (r, c),
                })
            } else {
                Ok(())
            }
        };
        check("alpha", &self.alpha, p)?;
        check("mu", &self.mu, p)?;
        if let Some(eta) = &self.eta {
            check("eta", eta, n)?;
        }
        if let Some(&bad) = self.alpha.iter().find(|a| !(0.0..=1.0).contains(*a)) {
            return Err(FitError::InvalidParameter {
                name: "alpha",
                value: bad,
                reason: "inclusion probabilities must lie in [0, 1]",
            });
        }
        Ok(())
    }

    fn starting_point(&self, i: usize) -> StartingPoint {
        let col = |m: &Array2<f64>| m.column(if m.ncols() == 1 { 0 } else { i }).to_owned();
        StartingPoint {
            alpha: col(&self.alpha),
            mu: col(&self.mu),
            eta: self.eta.as_ref().map(col),
        }
    }
}

/// Fits of every grid point, in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct GridFit {
    pub family: Family,
    pub points: Vec<GridPointFit>,
}

pub(crate) fn validate_data(
    x: &ArrayView2<f32>,
    y: &ArrayView1<f64>,
    family: Family,
) -> Result<()> {
    let (rows, cols) = x.dim();
    if rows == 0 || cols == 0 {
        return Err(FitError::EmptyDesign { rows, cols });
    }
    if rows != y.len() {
        return Err(FitError::DimensionMismatch {
            rows,
            len: y.len(),
        });
    }
    if family == Family::Binomial {
        if let Some((index, &value)) = y
            .iter()
            .enumerate()
            .find(|(_, v)| **v != 0.0 && **v != 1.0)
        {
            return Err(FitError::NonBinaryResponse { index, value });
        }
    }
    let constant = column_var(x).iter().filter(|&&v| v == 0.0).count();
    if constant > 0 {
        warn!("{constant} of {cols} variables are constant and carry no information");
    }
    Ok(())
}

fn random_start(sampler: &InitSampler, seed: u64, i: usize, p: usize) -> StartingPoint {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
    StartingPoint {
        alpha: sampler.simplex(&mut rng, p),
        mu: sampler.standard_normal(&mut rng, p),
        eta: None,
    }
}

pub(crate) fn best_index(points: &[GridPointFit]) -> usize {
    points
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.logw.total_cmp(&b.1.logw))
        .map_or(0, |(i, _)| i)
}

fn run_points<F>(data: &FitData<'_>, ns: usize, options: &FitOptions, setup: F) -> Vec<GridPointFit>
where
    F: Fn(usize) -> (Hyperparameters, StartingPoint) + Sync,
{
    let run = |i: usize| {
        let (hyper, start) = setup(i);
        let fit = optimize(data, hyper, start, options);
        debug!(
            "grid point {i}: logw = {:.6}, {} sweeps, {:?}",
            fit.logw, fit.iterations, fit.terminal
        );
        fit
    };
    #[cfg(feature = "rayon")]
    {
        (0..ns).into_par_iter().map(run).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        (0..ns).map(run).collect()
    }
}

/// Fits the variational approximation at every point of a hyperparameter grid.
///
/// `x` must already be adjusted for covariates (see [`crate::CovariateAdjustment`]) for
/// the Gaussian family; the binomial family handles the intercept internally and takes
/// a 0/1 response.
///
/// # Errors
/// Returns a [`FitError`] when the data, grid, initialization or options are
/// inconsistent. Grid points that exhaust `max_iter` are reported through
/// [`TerminalState::MaxIterReached`], not as errors.
///
/// # Example
/// ```
/// use ndarray::{Array1, Array2};
/// use spike_slab_vb::{Family, FitOptions, Grid, run_grid};
///
/// let x = Array2::from_shape_fn((50, 4), |(i, j)| (((i * 7 + j * 3) % 11) as f32 - 5.0) / 5.0);
/// let y = Array1::from_shape_fn(50, |i| 2.0 * x[[i, 0]] as f64);
/// let grid = Grid::with_logodds(1.0, 1.0, vec![-2.0, -1.0]).unwrap();
/// let opts = FitOptions::default();
/// let fit = run_grid(x.view(), y.view(), Family::Gaussian, &grid, None, &opts).unwrap();
/// assert_eq!(fit.points.len(), 2);
/// ```
pub fn run_grid<'a>(
    x: ArrayView2<'a, f32>,
    y: ArrayView1<'a, f64>,
    family: Family,
    grid: &Grid,
    init: Option<&Initialization>,
    options: &FitOptions,
) -> Result<GridFit> {
    validate_data(&x, &y, family)?;
    options.validate(family)?;
    let (n, p) = x.dim();
    let ns = grid.len();
    grid.validate(p, family)?;
    if let Some(init) = init {
        init.validate(n, p, ns)?;
    }

    let data = FitData::new(x, y, family);
    let sampler = InitSampler::new();

    let points = match init {
        Some(init) => run_points(&data, ns, options, |i| {
            (grid.hyperparameters(i, p), init.starting_point(i))
        }),
        None if ns > 1 && options.initial_search => {
            info!("searching for a shared start over {ns} grid points");
            let search = run_points(&data, ns, options, |i| {
                (
                    grid.hyperparameters(i, p),
                    random_start(&sampler, options.seed, i, p),
                )
            });
            let best = &search[best_index(&search)];
            info!(
                "restarting all grid points from the best search fit (logw = {:.6})",
                best.logw
            );
            run_points(&data, ns, options, |i| {
                let mut hyper = grid.hyperparameters(i, p);
                if options.update_sigma {
                    hyper.sigma = best.sigma;
                }
                if options.update_sa {
                    hyper.sa = best.sa;
                }
                let start = StartingPoint {
                    alpha: best.alpha.clone(),
                    mu: best.mu.clone(),
                    eta: best.eta.clone(),
                };
                (hyper, start)
            })
        }
        None => run_points(&data, ns, options, |i| {
            (
                grid.hyperparameters(i, p),
                random_start(&sampler, options.seed, i, p),
            )
        }),
    };

    let exhausted = points
        .iter()
        .filter(|f| f.terminal == TerminalState::MaxIterReached)
        .count();
    if exhausted > 0 {
        warn!(
            "{exhausted} of {ns} grid points stopped after {} sweeps without converging",
            options.max_iter
        );
    }
    let best = best_index(&points);
    info!(
        "fitted {ns} grid points ({family} family), best is {best} with logw = {:.6}",
        points[best].logw
    );
    Ok(GridFit { family, points })
}
