//! Linear regression under a mixture of slabs with an exact spike.

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use spike_slab_vb::{MixtureOptions, MixturePrior, run_mixture};
use statrs::distribution::Normal;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let (n, p) = (500, 200);
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
    let x = Array2::from_shape_fn((n, p), |_| rng.sample(Normal::standard()) as f32);
    // a few large effects and many small ones
    let beta: Array1<f64> = Array1::from_shape_fn(p, |j| match j {
        0..=2 => 1.0,
        3..=22 => 0.1,
        _ => 0.0,
    });
    let y = Array1::from_shape_fn(n, |i| {
        let signal: f64 = (0..p).map(|j| beta[j] * x[[i, j]] as f64).sum();
        signal + rng.sample(Normal::standard())
    });

    let prior = MixturePrior::new(vec![0.0, 0.01, 1.0], vec![0.9, 0.05, 0.05])?;
    let fit = run_mixture(x.view(), y.view(), &prior, None, &MixtureOptions::default())?;

    println!(
        "{:?} after {} sweeps, logw = {:.3}, sigma = {:.3}",
        fit.terminal, fit.iterations, fit.logw, fit.sigma
    );
    for (k, (sa, q)) in fit.sa.iter().zip(&fit.q).enumerate() {
        println!("component {k}: sa = {sa:<6} q = {q:.3}");
    }

    let mean = fit.posterior_mean();
    let slab = fit.slab_probability();
    println!("\n{:>8} {:>8} {:>10} {:>10}", "variable", "slab", "mean", "true");
    for j in 0..25 {
        println!("{j:>8} {:>8.3} {:>10.4} {:>10.2}", slab[j], mean[j], beta[j]);
    }
    Ok(())
}
