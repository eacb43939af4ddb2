//! Particle population: one column of state per hypothesis.

use std::fmt;

use nalgebra::{DMatrix, DVectorView};
use serde::Serialize;

use crate::config::{rotation_dimensions, DYNAMICS_DIMENSIONS};
use crate::TemplateId;

/// Typed index of a particle in the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ParticleId(pub usize);

impl ParticleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Fixed-capacity particle storage.
///
/// Vector-valued state (dynamics, scalings, rotations, offsets) is stored as
/// matrices with one column per particle, so a particle's state is a column
/// view and resampling is a column copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticlePopulation {
    pub(super) classes: Vec<TemplateId>,
    pub(super) alignment: Vec<f64>,
    /// 2 x N: speed, acceleration.
    pub(super) dynamics: DMatrix<f64>,
    /// D x N.
    pub(super) scalings: DMatrix<f64>,
    /// R x N, R = 1 for 2D input, 3 for 3D input, 0 otherwise.
    pub(super) rotations: DMatrix<f64>,
    /// D x N translation offsets.
    pub(super) offsets: DMatrix<f64>,
    pub(super) prior: Vec<f64>,
    pub(super) posterior: Vec<f64>,
    pub(super) likelihood: Vec<f64>,
}

impl ParticlePopulation {
    /// Allocate `count` particles for `input_dimensions`-dimensional input.
    ///
    /// State is zeroed, every particle tracks template 0, weights are uniform.
    pub fn new(count: usize, input_dimensions: usize) -> Self {
        let uniform = if count > 0 { 1.0 / count as f64 } else { 0.0 };
        Self {
            classes: vec![TemplateId(0); count],
            alignment: vec![0.0; count],
            dynamics: DMatrix::zeros(DYNAMICS_DIMENSIONS, count),
            scalings: DMatrix::zeros(input_dimensions, count),
            rotations: DMatrix::zeros(rotation_dimensions(input_dimensions), count),
            offsets: DMatrix::zeros(input_dimensions, count),
            prior: vec![uniform; count],
            posterior: vec![uniform; count],
            likelihood: vec![0.0; count],
        }
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.alignment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignment.is_empty()
    }

    pub fn input_dimensions(&self) -> usize {
        self.scalings.nrows()
    }

    pub fn rotation_dimensions(&self) -> usize {
        self.rotations.nrows()
    }

    /// True when the storage matches the given shape.
    pub fn has_shape(&self, count: usize, input_dimensions: usize) -> bool {
        self.len() == count && self.input_dimensions() == input_dimensions
    }

    /// Iterate over every particle id.
    pub fn ids(&self) -> impl Iterator<Item = ParticleId> {
        (0..self.len()).map(ParticleId)
    }

    // ===== Per-particle accessors =====

    #[inline]
    pub fn class(&self, id: ParticleId) -> TemplateId {
        self.classes[id.0]
    }

    #[inline]
    pub fn alignment(&self, id: ParticleId) -> f64 {
        self.alignment[id.0]
    }

    #[inline]
    pub fn speed(&self, id: ParticleId) -> f64 {
        self.dynamics[(0, id.0)]
    }

    #[inline]
    pub fn dynamics_of(&self, id: ParticleId) -> DVectorView<'_, f64> {
        self.dynamics.column(id.0)
    }

    #[inline]
    pub fn scalings_of(&self, id: ParticleId) -> DVectorView<'_, f64> {
        self.scalings.column(id.0)
    }

    #[inline]
    pub fn rotations_of(&self, id: ParticleId) -> DVectorView<'_, f64> {
        self.rotations.column(id.0)
    }

    #[inline]
    pub fn offset_of(&self, id: ParticleId) -> DVectorView<'_, f64> {
        self.offsets.column(id.0)
    }

    #[inline]
    pub fn prior(&self, id: ParticleId) -> f64 {
        self.prior[id.0]
    }

    #[inline]
    pub fn posterior(&self, id: ParticleId) -> f64 {
        self.posterior[id.0]
    }

    #[inline]
    pub fn likelihood(&self, id: ParticleId) -> f64 {
        self.likelihood[id.0]
    }

    /// Record a likelihood and set `posterior = prior * likelihood`.
    #[inline]
    pub fn set_likelihood(&mut self, id: ParticleId, likelihood: f64) {
        self.likelihood[id.0] = likelihood;
        self.posterior[id.0] = self.prior[id.0] * likelihood;
    }

    // ===== Whole-population views =====

    pub fn classes(&self) -> &[TemplateId] {
        &self.classes
    }

    pub fn alignments(&self) -> &[f64] {
        &self.alignment
    }

    pub fn dynamics(&self) -> &DMatrix<f64> {
        &self.dynamics
    }

    pub fn scalings(&self) -> &DMatrix<f64> {
        &self.scalings
    }

    pub fn rotations(&self) -> &DMatrix<f64> {
        &self.rotations
    }

    pub fn offsets(&self) -> &DMatrix<f64> {
        &self.offsets
    }

    pub fn priors(&self) -> &[f64] {
        &self.prior
    }

    pub fn posteriors(&self) -> &[f64] {
        &self.posterior
    }

    pub fn likelihoods(&self) -> &[f64] {
        &self.likelihood
    }

    /// Normalize posteriors to sum to 1.
    ///
    /// When the sum is zero or not finite the posteriors are reset to uniform
    /// and `false` is returned.
    pub fn normalize_posteriors(&mut self) -> bool {
        let sum: f64 = self.posterior.iter().sum();
        if sum > 0.0 && sum.is_finite() {
            for w in &mut self.posterior {
                *w /= sum;
            }
            true
        } else {
            self.reset_posteriors();
            false
        }
    }

    /// Set every posterior to `1/N`.
    pub fn reset_posteriors(&mut self) {
        let uniform = 1.0 / self.len().max(1) as f64;
        self.posterior.iter_mut().for_each(|w| *w = uniform);
    }

    /// Copy the full state of `src[from]` into `self[to]`.
    pub(super) fn copy_particle(&mut self, to: ParticleId, src: &ParticlePopulation, from: ParticleId) {
        let (t, f) = (to.0, from.0);
        self.classes[t] = src.classes[f];
        self.alignment[t] = src.alignment[f];
        self.dynamics.set_column(t, &src.dynamics.column(f));
        self.scalings.set_column(t, &src.scalings.column(f));
        self.rotations.set_column(t, &src.rotations.column(f));
        self.offsets.set_column(t, &src.offsets.column(f));
        self.prior[t] = src.prior[f];
        self.posterior[t] = src.posterior[f];
        self.likelihood[t] = src.likelihood[f];
    }

    /// Owned copy of one particle's state.
    pub fn snapshot(&self, id: ParticleId) -> ParticleSnapshot {
        ParticleSnapshot {
            id,
            class: self.class(id),
            alignment: self.alignment(id),
            dynamics: self.dynamics_of(id).iter().copied().collect(),
            scalings: self.scalings_of(id).iter().copied().collect(),
            rotations: self.rotations_of(id).iter().copied().collect(),
            offset: self.offset_of(id).iter().copied().collect(),
            prior: self.prior(id),
            posterior: self.posterior(id),
            likelihood: self.likelihood(id),
        }
    }

    /// Owned copy of every particle, for external visualization.
    pub fn snapshots(&self) -> Vec<ParticleSnapshot> {
        self.ids().map(|id| self.snapshot(id)).collect()
    }
}

/// Read-only copy of one particle's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticleSnapshot {
    pub id: ParticleId,
    pub class: TemplateId,
    pub alignment: f64,
    pub dynamics: Vec<f64>,
    pub scalings: Vec<f64>,
    pub rotations: Vec<f64>,
    pub offset: Vec<f64>,
    pub prior: f64,
    pub posterior: f64,
    pub likelihood: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shapes_2d() {
        let pop = ParticlePopulation::new(10, 2);
        assert_eq!(pop.len(), 10);
        assert_eq!(pop.input_dimensions(), 2);
        assert_eq!(pop.rotation_dimensions(), 1);
        assert_eq!(pop.dynamics().shape(), (2, 10));
        assert_eq!(pop.offsets().shape(), (2, 10));
        assert!(pop.has_shape(10, 2));
        assert!(!pop.has_shape(10, 3));
    }

    #[test]
    fn test_shapes_other_dimensions() {
        assert_eq!(ParticlePopulation::new(4, 3).rotation_dimensions(), 3);
        assert_eq!(ParticlePopulation::new(4, 5).rotation_dimensions(), 0);
        assert_eq!(ParticlePopulation::new(4, 1).rotation_dimensions(), 0);
    }

    #[test]
    fn test_uniform_weights() {
        let pop = ParticlePopulation::new(8, 2);
        for &w in pop.posteriors() {
            assert_relative_eq!(w, 0.125);
        }
        assert_relative_eq!(pop.priors().iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn test_set_likelihood_updates_posterior() {
        let mut pop = ParticlePopulation::new(4, 2);
        pop.set_likelihood(ParticleId(1), 0.5);
        assert_relative_eq!(pop.likelihood(ParticleId(1)), 0.5);
        assert_relative_eq!(pop.posterior(ParticleId(1)), 0.125);
    }

    #[test]
    fn test_normalize_posteriors() {
        let mut pop = ParticlePopulation::new(4, 2);
        for (i, l) in [1.0, 3.0, 0.0, 0.0].iter().enumerate() {
            pop.set_likelihood(ParticleId(i), *l);
        }
        assert!(pop.normalize_posteriors());
        assert_relative_eq!(pop.posterior(ParticleId(0)), 0.25);
        assert_relative_eq!(pop.posterior(ParticleId(1)), 0.75);
    }

    #[test]
    fn test_normalize_collapsed_weights_resets_uniform() {
        let mut pop = ParticlePopulation::new(4, 2);
        for id in pop.ids().collect::<Vec<_>>() {
            pop.set_likelihood(id, 0.0);
        }
        assert!(!pop.normalize_posteriors());
        for &w in pop.posteriors() {
            assert_relative_eq!(w, 0.25);
        }

        pop.set_likelihood(ParticleId(0), f64::NAN);
        assert!(!pop.normalize_posteriors());
        assert!(pop.posteriors().iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_copy_particle_and_snapshot() {
        let mut src = ParticlePopulation::new(2, 2);
        src.classes[1] = TemplateId(3);
        src.alignment[1] = 0.4;
        src.dynamics[(0, 1)] = 1.1;
        src.scalings[(1, 1)] = 0.9;
        src.rotations[(0, 1)] = 0.2;
        src.offsets[(0, 1)] = 5.0;

        let mut dst = ParticlePopulation::new(2, 2);
        dst.copy_particle(ParticleId(0), &src, ParticleId(1));

        let snap = dst.snapshot(ParticleId(0));
        assert_eq!(snap.class, TemplateId(3));
        assert_relative_eq!(snap.alignment, 0.4);
        assert_eq!(snap.dynamics, vec![1.1, 0.0]);
        assert_eq!(snap.scalings, vec![0.0, 0.9]);
        assert_eq!(snap.rotations, vec![0.2]);
        assert_eq!(snap.offset, vec![5.0, 0.0]);
        assert_eq!(dst.snapshots().len(), 2);
    }
}
