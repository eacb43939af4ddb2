//! Random sources for the particle filter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::config::Spread;

/// Uniform and Gaussian sampler backed by a seedable generator.
#[derive(Debug, Clone)]
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    /// Sampler seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sampler.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform sample in `[0, 1)`.
    #[inline]
    pub fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Standard normal sample.
    #[inline]
    pub fn standard_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    /// Zero-mean Gaussian sample with standard deviation `sigma`.
    #[inline]
    pub fn gaussian(&mut self, sigma: f64) -> f64 {
        if sigma == 0.0 {
            return 0.0;
        }
        self.standard_normal() * sigma
    }

    /// Uniform sample in the spread interval.
    #[inline]
    pub fn spread(&mut self, spread: &Spread) -> f64 {
        let u = self.unit();
        spread.at(u)
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::from_entropy()
    }
}
