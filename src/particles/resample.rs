//! Systematic resampling driven by the effective sample size.

use crate::sampling::Sampler;
use crate::utils::effective_sample_size;

use super::population::{ParticleId, ParticlePopulation};

/// Systematic resampler.
///
/// Resampling reads from the current population and writes into a reusable
/// output buffer which is then swapped in, so a particle copied twice never
/// observes a partially overwritten source.
#[derive(Debug, Clone)]
pub struct Resampler {
    threshold: usize,
    buffer: Option<ParticlePopulation>,
    cumulative: Vec<f64>,
}

impl Resampler {
    /// Create a resampler that triggers when the effective sample size drops
    /// below `threshold`.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            buffer: None,
            cumulative: Vec::new(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: usize) {
        self.threshold = threshold;
    }

    /// Resample when `1 / sum(w^2)` of the (normalized) posteriors is below
    /// the threshold. Returns true if resampling happened.
    pub fn resample_if_needed(&mut self, population: &mut ParticlePopulation, sampler: &mut Sampler) -> bool {
        let ess = effective_sample_size(population.posteriors());
        if ess < self.threshold as f64 {
            log::trace!("resampling: effective sample size {:.1} < {}", ess, self.threshold);
            self.resample(population, sampler);
            true
        } else {
            false
        }
    }

    /// Unconditional systematic resampling.
    ///
    /// With `u0` drawn in `[0, 1/N)`, output particle `j` copies the first
    /// particle whose cumulative weight reaches `u0 + j/N`. Posteriors are
    /// reset to `1/N` afterwards.
    pub fn resample(&mut self, population: &mut ParticlePopulation, sampler: &mut Sampler) {
        let count = population.len();
        if count == 0 {
            return;
        }

        self.cumulative.clear();
        let mut running = 0.0;
        for &w in population.posteriors() {
            running += w;
            self.cumulative.push(running);
        }

        let mut buffer = match self.buffer.take() {
            Some(buffer) if buffer.has_shape(count, population.input_dimensions()) => buffer,
            _ => population.clone(),
        };

        let step = 1.0 / count as f64;
        let start = sampler.unit() * step;
        let mut i = 0;
        for j in 0..count {
            let target = start + j as f64 * step;
            while target > self.cumulative[i] && i < count - 1 {
                i += 1;
            }
            buffer.copy_particle(ParticleId(j), population, ParticleId(i));
        }

        std::mem::swap(population, &mut buffer);
        population.reset_posteriors();
        self.buffer = Some(buffer);
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new(0)
    }
}
