//! End-to-end variable selection on simulated data

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng, prelude::Distribution};
use rand_chacha::ChaCha8Rng;
use spike_slab_vb::math::sigmoid;
use spike_slab_vb::{
    CovariateAdjustment, Family, FitOptions, Grid, MixtureOptions, MixturePrior, TerminalState,
    run_grid, run_mixture,
};
use statrs::distribution::Normal;

/// Standard normal design with `n` samples and `p` variables.
fn normal_design(rng: &mut ChaCha8Rng, n: usize, p: usize) -> Array2<f32> {
    let norm = Normal::standard();
    Array2::from_shape_simple_fn((n, p), || norm.sample(&mut *rng) as f32)
}

/// `y = X b + e` with standard normal noise.
fn linear_response(rng: &mut ChaCha8Rng, x: &Array2<f32>, effects: &[(usize, f64)]) -> Array1<f64> {
    let norm = Normal::standard();
    Array1::from_shape_fn(x.nrows(), |i| {
        let signal: f64 = effects.iter().map(|&(j, b)| b * x[[i, j]] as f64).sum();
        signal + norm.sample(&mut *rng)
    })
}

fn fraction_below(values: impl Iterator<Item = f64>, threshold: f64) -> f64 {
    let (mut below, mut total) = (0usize, 0usize);
    for v in values {
        total += 1;
        if v < threshold {
            below += 1;
        }
    }
    below as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_grid_selects_the_causal_variable() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let (n, p, causal) = (500, 100, 17);
        let x = normal_design(&mut rng, n, p);
        let y = linear_response(&mut rng, &x, &[(causal, 2.0)]);
        let data = CovariateAdjustment::intercept_only(n)
            .unwrap()
            .adjust(x.view(), y.view())
            .unwrap();

        let logodds: Vec<f64> = (0..5).map(|i| -2.0 + 1.7 * i as f64 / 4.0).collect();
        let grid = Grid::with_logodds(1.0, 1.0, logodds).unwrap();
        let fit = run_grid(
            data.x.view(),
            data.y.view(),
            Family::Gaussian,
            &grid,
            None,
            &FitOptions::default(),
        )
        .unwrap();

        assert_eq!(fit.len(), 5);
        assert!(fit.points.iter().all(|f| f.terminal == TerminalState::Converged));
        let best = fit.best();
        assert!(best.alpha[causal] > 0.9, "alpha = {}", best.alpha[causal]);
        let nulls = (0..p).filter(|&j| j != causal).map(|j| best.alpha[j]);
        let frac = fraction_below(nulls, 0.1);
        assert!(frac >= 0.9, "only {frac} of null variables excluded");

        let beta = fit.beta();
        assert!((beta[causal] - 2.0).abs() < 0.3, "beta = {}", beta[causal]);
        let w: f64 = fit.weights().iter().sum();
        assert!((w - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_grid_points_reach_the_same_fixed_point() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let x = normal_design(&mut rng, 200, 2);
        let y = linear_response(&mut rng, &x, &[(0, 1.0)]);
        let grid = Grid::with_logodds(1.0, 1.0, vec![-1.0, -1.0]).unwrap();
        // each point starts from its own draw, seeded with seed + i
        let opts = FitOptions {
            tol: 1e-8,
            initial_search: false,
            seed: 9,
            ..Default::default()
        };
        let fit = run_grid(x.view(), y.view(), Family::Gaussian, &grid, None, &opts).unwrap();
        let (a, b) = (&fit.points[0], &fit.points[1]);
        for j in 0..2 {
            assert!((a.alpha[j] - b.alpha[j]).abs() < 1e-4);
            assert!((a.mu[j] - b.mu[j]).abs() < 1e-3);
        }
        assert!((a.logw - b.logw).abs() < 1e-6 * a.logw.abs());
        assert!(a.alpha[0] > 0.99);
    }

    #[test]
    fn logistic_grid_recovers_both_effects() {
        let mut rng = ChaCha8Rng::seed_from_u64(77);
        let (n, p) = (300, 20);
        let x = normal_design(&mut rng, n, p);
        let y = Array1::from_shape_fn(n, |i| {
            let prob = sigmoid(-0.5 + 2.0 * x[[i, 3]] as f64 - 1.5 * x[[i, 7]] as f64);
            if rng.r#gen::<f64>() < prob { 1.0 } else { 0.0 }
        });
        let grid = Grid::with_logodds(1.0, 1.0, vec![-3.0, -2.0, -1.0]).unwrap();
        let fit = run_grid(
            x.view(),
            y.view(),
            Family::Binomial,
            &grid,
            None,
            &FitOptions::default(),
        )
        .unwrap();

        let pip = fit.pip();
        assert!(pip[3] > 0.9 && pip[7] > 0.9, "pip = {pip}");
        let beta = fit.beta();
        assert!(beta[3] > 1.0 && beta[7] < -0.75, "beta = {beta}");
        let best = fit.best();
        assert_eq!(best.eta.as_ref().map(|e| e.len()), Some(n));
        assert!(best.intercept.is_some());

        let prob = fit.predict(x.view()).unwrap();
        assert!(prob.iter().all(|&q| q > 0.0 && q < 1.0));
        // predictions separate the classes on the training data
        let hits = prob
            .iter()
            .zip(y.iter())
            .filter(|&(&q, &yi)| (q > 0.5) == (yi == 1.0))
            .count();
        assert!(hits as f64 / n as f64 > 0.7);
    }

    #[test]
    fn spike_component_absorbs_null_variables() {
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let (n, p) = (200, 50);
        let causal = [4usize, 20, 41];
        let x = normal_design(&mut rng, n, p);
        let effects: Vec<(usize, f64)> = causal.iter().map(|&j| (j, 1.0)).collect();
        let y = linear_response(&mut rng, &x, &effects);

        let prior = MixturePrior::new(vec![0.0, 4.0], vec![0.5, 0.5]).unwrap();
        let opts = MixtureOptions::default();
        let fit = run_mixture(x.view(), y.view(), &prior, None, &opts).unwrap();

        assert_eq!(fit.terminal, TerminalState::Converged);
        let nulls: Vec<usize> = (0..p).filter(|j| !causal.contains(j)).collect();
        let spiked = nulls.iter().filter(|&&j| fit.alpha[[j, 0]] > 0.9).count();
        assert!(
            spiked as f64 >= 0.9 * nulls.len() as f64,
            "{spiked} of {} nulls assigned to the spike",
            nulls.len()
        );
        let mean_spike: f64 =
            nulls.iter().map(|&j| fit.alpha[[j, 0]]).sum::<f64>() / nulls.len() as f64;
        assert!(mean_spike > 0.9);

        let slab = fit.slab_probability();
        for &j in &causal {
            assert!(slab[j] > 0.9, "variable {j}: slab probability {}", slab[j]);
        }
        assert!(fit.q[0] > fit.q[1]);
        assert!((fit.sigma - 1.0).abs() < 0.4, "sigma = {}", fit.sigma);
        assert_eq!(fit.logw_trace.len(), fit.iterations);
        assert_eq!(fit.err_trace.len(), fit.iterations);
    }

    #[test]
    fn covariate_effects_survive_adjustment() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let (n, p) = (300, 10);
        let x = normal_design(&mut rng, n, p);
        let age = Array2::from_shape_fn((n, 1), |_| rng.r#gen::<f64>() * 10.0);
        let genetic = linear_response(&mut rng, &x, &[(2, 1.0)]);
        let y = Array1::from_shape_fn(n, |i| 3.0 + 0.5 * age[[i, 0]] + genetic[i]);

        let data = CovariateAdjustment::new(age.view())
            .unwrap()
            .adjust(x.view(), y.view())
            .unwrap();
        let grid = Grid::with_logodds(1.0, 1.0, vec![-2.0]).unwrap();
        let fit = run_grid(
            data.x.view(),
            data.y.view(),
            Family::Gaussian,
            &grid,
            None,
            &FitOptions::default(),
        )
        .unwrap();
        let effects = data.covariate_effects(&fit.beta().view());
        assert!((effects[0] - 3.0).abs() < 0.5, "intercept = {}", effects[0]);
        assert!((effects[1] - 0.5).abs() < 0.1, "slope = {}", effects[1]);
    }
}
