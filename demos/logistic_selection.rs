//! Variable selection in a logistic model.
//!
//! The logistic likelihood is replaced by a quadratic bound at one location per
//! sample; the locations are re-optimized before every sweep.

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use spike_slab_vb::math::sigmoid;
use spike_slab_vb::{Family, FitOptions, Grid, run_grid};
use statrs::distribution::Normal;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let (n, p) = (2_000, 500);
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n, p), |_| rng.sample(Normal::standard()) as f32);
    let causal = [(3, 1.0), (77, -0.8), (301, 0.6)];
    let y = Array1::from_shape_fn(n, |i| {
        let eta: f64 = -0.5 + causal.iter().map(|&(j, b)| b * x[[i, j]] as f64).sum::<f64>();
        if rng.gen_bool(sigmoid(eta)) { 1.0 } else { 0.0 }
    });

    let grid = Grid::with_logodds(1.0, 1.0, vec![-5.0, -4.0, -3.0, -2.0])?;
    let fit = run_grid(x.view(), y.view(), Family::Binomial, &grid, None, &FitOptions::default())?;

    for (point, w) in fit.points.iter().zip(fit.weights()) {
        println!(
            "logw = {:>10.3}  weight = {w:.3}  intercept = {:>7.3}  sweeps = {:>4}  {:?}",
            point.logw,
            point.intercept.unwrap_or(f64::NAN),
            point.iterations,
            point.terminal
        );
    }

    let pip = fit.pip();
    let beta = fit.beta();
    println!("\nselected variables (pip > 0.5):");
    for j in (0..p).filter(|&j| pip[j] > 0.5) {
        println!("  {j:>4}: pip = {:.3}, beta = {:.3}", pip[j], beta[j]);
    }

    let prob = fit.predict(x.view())?;
    let accuracy = prob
        .iter()
        .zip(y.iter())
        .filter(|&(&q, &yi)| (q > 0.5) == (yi == 1.0))
        .count() as f64
        / n as f64;
    println!("\ntraining accuracy: {accuracy:.3}");
    Ok(())
}
