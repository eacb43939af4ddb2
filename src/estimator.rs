//! Per-template aggregation of the particle population.

use serde::Serialize;

use crate::config::{rotation_dimensions, DYNAMICS_DIMENSIONS};
use crate::particles::ParticlePopulation;
use crate::TemplateId;

/// Aggregated state of the particles following one template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GestureEstimate {
    /// Posterior-weighted phase in `[0, 1]`.
    pub alignment: f64,
    /// Posterior-weighted speed and acceleration.
    pub dynamics: Vec<f64>,
    /// Posterior-weighted scale per input dimension.
    pub scalings: Vec<f64>,
    /// Posterior-weighted rotation angles.
    pub rotations: Vec<f64>,
    /// Sum of the posteriors of the particles on this template.
    pub probability: f64,
    /// Sum of the raw likelihoods of the particles on this template.
    pub likelihood: f64,
}

impl GestureEstimate {
    /// An all-zero estimate.
    pub fn zeroed(input_dimensions: usize) -> Self {
        Self {
            alignment: 0.0,
            dynamics: vec![0.0; DYNAMICS_DIMENSIONS],
            scalings: vec![0.0; input_dimensions],
            rotations: vec![0.0; rotation_dimensions(input_dimensions)],
            probability: 0.0,
            likelihood: 0.0,
        }
    }
}

/// Result of one update: one estimate per template plus the winner.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Outcome {
    pub estimates: Vec<GestureEstimate>,
    pub most_probable: Option<TemplateId>,
}

impl Outcome {
    /// Outcome for an empty vocabulary.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Zeroed outcome for `template_count` templates.
    pub fn zeroed(template_count: usize, input_dimensions: usize) -> Self {
        Self {
            estimates: vec![GestureEstimate::zeroed(input_dimensions); template_count],
            most_probable: None,
        }
    }

    /// Estimate for one template.
    pub fn estimate(&self, id: TemplateId) -> Option<&GestureEstimate> {
        self.estimates.get(id.0)
    }

    /// Aggregated probability of every template, in vocabulary order.
    pub fn probabilities(&self) -> Vec<f64> {
        self.estimates.iter().map(|e| e.probability).collect()
    }
}

/// Turns a particle population into an [`Outcome`].
///
/// Particles whose posterior is not finite are excluded from every aggregate
/// of their template (probability, averages and likelihood), so probabilities
/// are non-negative and sum to at most 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Estimator;

impl Estimator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate `population` over `template_count` templates.
    ///
    /// Averages are weighted by the posteriors renormalized within each
    /// template. A template without probability mass gets a zeroed estimate.
    /// Particles assigned to an id outside the vocabulary are ignored.
    pub fn estimate(&self, population: &ParticlePopulation, template_count: usize) -> Outcome {
        if template_count == 0 {
            return Outcome::empty();
        }
        let dims = population.input_dimensions();
        let mut estimates = vec![GestureEstimate::zeroed(dims); template_count];

        for id in population.ids() {
            let weight = population.posterior(id);
            if !weight.is_finite() {
                continue;
            }
            let Some(estimate) = estimates.get_mut(population.class(id).0) else {
                continue;
            };

            estimate.probability += weight;
            estimate.alignment += weight * population.alignment(id);
            accumulate(&mut estimate.dynamics, population.dynamics_of(id).iter(), weight);
            accumulate(&mut estimate.scalings, population.scalings_of(id).iter(), weight);
            accumulate(&mut estimate.rotations, population.rotations_of(id).iter(), weight);

            let likelihood = population.likelihood(id);
            if likelihood.is_finite() {
                estimate.likelihood += likelihood;
            }
        }

        for estimate in &mut estimates {
            let mass = estimate.probability;
            if mass > 0.0 {
                estimate.alignment /= mass;
                estimate.dynamics.iter_mut().for_each(|v| *v /= mass);
                estimate.scalings.iter_mut().for_each(|v| *v /= mass);
                estimate.rotations.iter_mut().for_each(|v| *v /= mass);
            } else {
                let likelihood = estimate.likelihood;
                *estimate = GestureEstimate::zeroed(dims);
                estimate.likelihood = likelihood;
            }
        }

        let most_probable = most_probable(&estimates);
        Outcome { estimates, most_probable }
    }
}

fn accumulate<'a>(target: &mut [f64], values: impl Iterator<Item = &'a f64>, weight: f64) {
    for (t, v) in target.iter_mut().zip(values) {
        *t += weight * v;
    }
}

/// First template whose probability is strictly greater than every earlier one.
///
/// `None` when no template has positive probability.
fn most_probable(estimates: &[GestureEstimate]) -> Option<TemplateId> {
    let mut best = None;
    let mut max = 0.0;
    for (i, estimate) in estimates.iter().enumerate() {
        if estimate.probability > max {
            max = estimate.probability;
            best = Some(TemplateId(i));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::ParticleId;
    use crate::sampling::Sampler;
    use crate::{NoiseModel, Parameters, TransitionModel};
    use approx::assert_relative_eq;

    /// Four 2D particles spread over two templates.
    fn population(likelihoods: [f64; 4]) -> ParticlePopulation {
        let params = Parameters::default();
        let transition = TransitionModel::new(&params, NoiseModel::derive(&params, 2));
        let mut pop = ParticlePopulation::new(4, 2);
        let mut sampler = Sampler::seeded(1);
        transition.initialize(&mut pop, &[TemplateId(0), TemplateId(1)], &mut sampler);
        // round-robin: particles 0,2 on template 0, particles 1,3 on template 1
        for (n, l) in likelihoods.iter().enumerate() {
            pop.set_likelihood(ParticleId(n), *l);
        }
        pop.normalize_posteriors();
        pop
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let pop = population([1.0, 2.0, 3.0, 4.0]);
        let outcome = Estimator::new().estimate(&pop, 2);

        assert_eq!(outcome.estimates.len(), 2);
        let total: f64 = outcome.probabilities().iter().sum();
        assert_relative_eq!(total, 1.0);
        // template 0 holds particles 0 and 2, template 1 holds 1 and 3
        assert_relative_eq!(outcome.estimates[0].probability, 0.4);
        assert_relative_eq!(outcome.estimates[1].probability, 0.6);
        assert_eq!(outcome.most_probable, Some(TemplateId(1)));
        assert_relative_eq!(outcome.estimates[1].likelihood, 6.0);
    }

    #[test]
    fn test_weighted_alignment_is_renormalized() {
        let pop = population([1.0, 1.0, 3.0, 1.0]);
        let outcome = Estimator::new().estimate(&pop, 2);

        let a0 = pop.alignment(ParticleId(0));
        let a2 = pop.alignment(ParticleId(2));
        assert_relative_eq!(outcome.estimates[0].alignment, 0.25 * a0 + 0.75 * a2, epsilon = 1e-12);

        let s0 = pop.speed(ParticleId(0));
        let s2 = pop.speed(ParticleId(2));
        assert_relative_eq!(outcome.estimates[0].dynamics[0], 0.25 * s0 + 0.75 * s2, epsilon = 1e-12);
        assert_eq!(outcome.estimates[0].scalings.len(), 2);
        assert_eq!(outcome.estimates[0].rotations.len(), 1);
    }

    #[test]
    fn test_ties_resolve_to_first_template() {
        let pop = population([1.0, 1.0, 1.0, 1.0]);
        let outcome = Estimator::new().estimate(&pop, 2);
        assert_eq!(outcome.most_probable, Some(TemplateId(0)));
    }

    #[test]
    fn test_template_without_particles_is_zeroed() {
        let pop = population([1.0, 1.0, 1.0, 1.0]);
        let outcome = Estimator::new().estimate(&pop, 3);
        assert_eq!(outcome.estimates[2], GestureEstimate::zeroed(2));
    }

    #[test]
    fn test_nan_posteriors_are_excluded() {
        let mut pop = population([1.0, 1.0, 1.0, 1.0]);
        pop.set_likelihood(ParticleId(0), f64::NAN);
        let outcome = Estimator::new().estimate(&pop, 2);

        let total: f64 = outcome.probabilities().iter().sum();
        assert!(total <= 1.0 && total >= 0.0);
        assert!(outcome.estimates.iter().all(|e| e.probability >= 0.0));
        assert!(outcome.estimates[0].alignment.is_finite());
        assert!(outcome.estimates[0].likelihood.is_finite());
        assert_relative_eq!(outcome.estimates[0].alignment, pop.alignment(ParticleId(2)), epsilon = 1e-12);
    }

    #[test]
    fn test_no_mass_gives_no_winner() {
        let mut pop = population([1.0, 1.0, 1.0, 1.0]);
        for n in 0..4 {
            pop.set_likelihood(ParticleId(n), 0.0);
        }
        let outcome = Estimator::new().estimate(&pop, 2);
        assert_eq!(outcome.most_probable, None);
        assert!(outcome.probabilities().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_empty_vocabulary() {
        let pop = ParticlePopulation::new(4, 2);
        let outcome = Estimator::new().estimate(&pop, 0);
        assert_eq!(outcome, Outcome::empty());
        assert!(outcome.estimate(TemplateId(0)).is_none());
    }
}
