use ndarray::{Array1, Array2};
use rand::{Rng, prelude::Distribution};
use statrs::distribution::{Exp, Normal};

/// Unified interface for the draws used by random initialization
pub(crate) trait RngDraw<R: Rng + ?Sized> {
    fn sample_exp(&self, rng: &mut R) -> f64;
    fn sample_norm(&self, rng: &mut R) -> f64;
}

/// Draws random starting points for the variational factors.
#[derive(Debug, Clone)]
pub(crate) struct InitSampler {
    exp: Exp,
    std_norm: Normal,
}

impl InitSampler {
    pub fn new() -> Self {
        Self {
            exp: Exp::new(1.0).expect("Exp(1) is always valid"),
            std_norm: Normal::standard(),
        }
    }

    /// A point drawn uniformly from the probability simplex of dimension `len`
    /// (normalized unit exponentials, i.e. a flat Dirichlet draw).
    pub fn simplex<R: Rng + ?Sized>(&self, rng: &mut R, len: usize) -> Array1<f64> {
        let mut v = Array1::from_shape_simple_fn(len, || self.sample_exp(&mut *rng));
        let total = v.sum();
        v /= total;
        v
    }

    /// `len` independent standard normal draws.
    pub fn standard_normal<R: Rng + ?Sized>(&self, rng: &mut R, len: usize) -> Array1<f64> {
        Array1::from_shape_simple_fn(len, || self.sample_norm(&mut *rng))
    }

    /// A `rows x cols` matrix whose rows are independent simplex draws.
    pub fn simplex_rows<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        rows: usize,
        cols: usize,
    ) -> Array2<f64> {
        let mut m = Array2::from_shape_simple_fn((rows, cols), || self.sample_exp(&mut *rng));
        for mut row in m.rows_mut() {
            let total = row.sum();
            row /= total;
        }
        m
    }
}

impl<R: Rng + ?Sized> RngDraw<R> for InitSampler {
    /// Sample from the Exp(1) distribution
    #[inline(always)]
    fn sample_exp(&self, rng: &mut R) -> f64 {
        self.exp.sample(rng)
    }

    /// Sample from the standard normal distribution
    #[inline(always)]
    fn sample_norm(&self, rng: &mut R) -> f64 {
        self.std_norm.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn simplex_draws_sum_to_one() {
        let sampler = InitSampler::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let v = sampler.simplex(&mut rng, 50);
        assert_relative_eq!(v.sum(), 1.0, epsilon = 1e-12);
        assert!(v.iter().all(|&a| a > 0.0));

        let m = sampler.simplex_rows(&mut rng, 4, 3);
        for row in m.rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn draws_are_reproducible_from_the_seed() {
        let sampler = InitSampler::new();
        let a = sampler.standard_normal(&mut ChaCha8Rng::seed_from_u64(1), 8);
        let b = sampler.standard_normal(&mut ChaCha8Rng::seed_from_u64(1), 8);
        assert_eq!(a, b);
    }
}
