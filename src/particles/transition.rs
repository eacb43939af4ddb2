//! Particle transition: initial spreading, random-walk prediction and
//! alignment boundary handling.

use crate::config::{NoiseModel, Parameters, Spread};
use crate::sampling::Sampler;
use crate::TemplateId;

use super::population::{ParticleId, ParticlePopulation};

/// What happened to a particle's alignment at the `[0, 1]` boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryEvent {
    /// Alignment stayed inside `[0, 1]`.
    Inside,
    /// Alignment fell below 0 and was reflected.
    ReflectedStart,
    /// Alignment passed 1 and was reflected back.
    ReflectedEnd,
    /// Alignment passed 1 with segmentation on: the particle was reassigned.
    Reassigned { from: TemplateId, to: TemplateId },
}

/// Random-walk motion model for the particle state.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionModel {
    noise: NoiseModel,
    alignment_spread: Spread,
    dynamics_spread: Spread,
    acceleration_spread: Spread,
    scalings_spread: Spread,
    rotations_spread: Spread,
}

impl TransitionModel {
    /// Create a transition model from the parameters and the derived noise model.
    pub fn new(parameters: &Parameters, noise: NoiseModel) -> Self {
        Self {
            noise,
            alignment_spread: parameters.alignment_spread,
            dynamics_spread: parameters.dynamics_spread,
            acceleration_spread: Spread::new(0.0, parameters.dynamics_spread.range),
            scalings_spread: parameters.scalings_spread,
            rotations_spread: parameters.rotations_spread,
        }
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    /// Scatter every particle over the initial spreads.
    ///
    /// Classes are assigned round-robin over `active`, offsets are zeroed and
    /// prior and posterior weights are set to `1/N`. An empty `active` list
    /// leaves the classes untouched.
    pub fn initialize(&self, population: &mut ParticlePopulation, active: &[TemplateId], sampler: &mut Sampler) {
        let uniform = 1.0 / population.len().max(1) as f64;
        for n in 0..population.len() {
            let id = ParticleId(n);
            population.alignment[n] = sampler.spread(&self.alignment_spread);
            self.redraw_state(population, id, sampler);
            if !active.is_empty() {
                population.classes[n] = active[n % active.len()];
            }
            population.prior[n] = uniform;
            population.posterior[n] = uniform;
            population.likelihood[n] = 0.0;
        }
        population.offsets.fill(0.0);
    }

    /// Draw dynamics, scalings and rotations of one particle from the initial spreads.
    fn redraw_state(&self, population: &mut ParticlePopulation, id: ParticleId, sampler: &mut Sampler) {
        let n = id.0;
        population.dynamics[(0, n)] = sampler.spread(&self.dynamics_spread);
        if population.dynamics.nrows() > 1 {
            population.dynamics[(1, n)] = sampler.spread(&self.acceleration_spread);
        }
        for d in 0..population.scalings.nrows() {
            population.scalings[(d, n)] = sampler.spread(&self.scalings_spread);
        }
        for r in 0..population.rotations.nrows() {
            population.rotations[(r, n)] = sampler.spread(&self.rotations_spread);
        }
    }

    /// Advance one particle by one prediction sub-step.
    ///
    /// The alignment moves by the speed normalized to the template length,
    /// the speed by the acceleration, and every continuous component takes a
    /// Gaussian random-walk step. The current posterior becomes the prior.
    pub fn predict(&self, population: &mut ParticlePopulation, id: ParticleId, template_len: usize, sampler: &mut Sampler) {
        let n = id.0;
        let len = template_len.max(1) as f64;

        let speed = population.dynamics[(0, n)];
        population.alignment[n] += sampler.gaussian(self.noise.alignment_sigma) + speed / len;

        let dynamics_rows = population.dynamics.nrows();
        if dynamics_rows > 1 {
            let acceleration = population.dynamics[(1, n)];
            population.dynamics[(0, n)] += sampler.gaussian(self.noise.dynamics_sigma[0]) + acceleration / len;
            population.dynamics[(1, n)] += sampler.gaussian(self.noise.dynamics_sigma[1]);
        } else if dynamics_rows == 1 {
            population.dynamics[(0, n)] += sampler.gaussian(self.noise.dynamics_sigma[0]);
        }

        for (d, sigma) in self.noise.scalings_sigma.iter().enumerate().take(population.scalings.nrows()) {
            population.scalings[(d, n)] += sampler.gaussian(*sigma);
        }
        for (r, sigma) in self.noise.rotations_sigma.iter().enumerate().take(population.rotations.nrows()) {
            population.rotations[(r, n)] += sampler.gaussian(*sigma);
        }

        population.prior[n] = population.posterior[n];
    }

    /// Keep a particle's alignment inside `[0, 1]`.
    ///
    /// Below 0 the alignment is reflected. Above 1 it is reflected back unless
    /// `segmentation` is set, in which case the particle restarts on
    /// `active[n % active.len()]` with a fresh state, its offset rebased on
    /// `observation` and a uniform prior.
    pub fn enforce_bounds(
        &self,
        population: &mut ParticlePopulation,
        id: ParticleId,
        segmentation: bool,
        observation: &[f64],
        active: &[TemplateId],
        sampler: &mut Sampler,
    ) -> BoundaryEvent {
        let n = id.0;
        let alignment = population.alignment[n];

        if alignment < 0.0 {
            population.alignment[n] = alignment.abs();
            return BoundaryEvent::ReflectedStart;
        }
        if alignment <= 1.0 || alignment.is_nan() {
            return BoundaryEvent::Inside;
        }
        if !segmentation || active.is_empty() {
            population.alignment[n] = (2.0 - alignment).abs();
            return BoundaryEvent::ReflectedEnd;
        }

        let from = population.classes[n];
        let to = active[n % active.len()];
        population.alignment[n] = sampler.unit() * 0.5;
        population.classes[n] = to;
        for (d, value) in observation.iter().enumerate().take(population.offsets.nrows()) {
            population.offsets[(d, n)] = *value;
        }
        self.redraw_state(population, id, sampler);
        population.prior[n] = 1.0 / population.len().max(1) as f64;

        BoundaryEvent::Reassigned { from, to }
    }
}
