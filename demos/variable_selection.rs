//! Variable selection in a linear model with a spike-and-slab prior.
//!
//! The example:
//! 1. Simulates a 1000 x 2000 design with five causal variables
//! 2. Removes the intercept from the data
//! 3. Fits the variational approximation over a grid of prior log-odds
//! 4. Reports the averaged inclusion probabilities of the top variables

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use spike_slab_vb::{CovariateAdjustment, Family, FitOptions, Grid, run_grid};
use statrs::distribution::Normal;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let (n, p) = (1_000, 2_000);
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n, p), |_| rng.sample(Normal::standard()) as f32);
    let causal = [(10, 0.3), (250, -0.25), (900, 0.2), (1500, 0.35), (1999, -0.15)];
    let y = Array1::from_shape_fn(n, |i| {
        let signal: f64 = causal.iter().map(|&(j, b)| b * x[[i, j]] as f64).sum();
        5.0 + signal + rng.sample(Normal::standard())
    });

    let data = CovariateAdjustment::intercept_only(n)?.adjust(x.view(), y.view())?;
    let logodds: Vec<f64> = (0..10).map(|i| -5.0 + 0.4 * i as f64).collect();
    let grid = Grid::with_logodds(1.0, 0.1, logodds.clone())?;
    let opts = FitOptions {
        update_sigma: true,
        ..Default::default()
    };
    let fit = run_grid(data.x.view(), data.y.view(), Family::Gaussian, &grid, None, &opts)?;

    let best = fit.best();
    println!(
        "best grid point: logodds = {:.2}, logw = {:.3}, sigma = {:.3}",
        logodds[fit.best_index()],
        best.logw,
        best.sigma
    );

    let pip = fit.pip();
    let beta = fit.beta();
    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| pip[b].total_cmp(&pip[a]));
    println!("\n{:>8} {:>8} {:>10} {:>10}", "variable", "pip", "beta", "true");
    for &j in order.iter().take(10) {
        let truth = causal.iter().find(|c| c.0 == j).map_or(0.0, |c| c.1);
        println!("{j:>8} {:>8.3} {:>10.4} {truth:>10.2}", pip[j], beta[j]);
    }
    let effects = data.covariate_effects(&beta.view());
    println!("\nintercept: {:.3}", effects[0]);
    Ok(())
}
