//! Observation model: scores a particle's hypothesis against a live observation.
//!
//! This module provides:
//! - `ObservationModel` - template frame lookup, geometric transform, weighted distance, kernel
//! - `LikelihoodKernel` - Gaussian and Student's-t kernels (enum dispatch)
//! - Geometry helpers (scaling, 2D/3D rotation, weighted squared distance)

mod geometry;
mod kernel;

pub use geometry::{rotate, transform_frame, weighted_squared_distance};
pub use kernel::{GaussianKernel, Kernel, LikelihoodKernel, StudentTKernel};

use nalgebra::storage::RawStorage;
use nalgebra::{DVector, Dim, Matrix, U1};

use crate::GestureTemplate;

/// Likelihood model shared by every particle.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationModel {
    kernel: LikelihoodKernel,
    tolerance: f64,
    dim_weights: Vec<f64>,
}

impl ObservationModel {
    /// Create an observation model.
    ///
    /// # Arguments
    /// * `kernel` - Distance-to-likelihood kernel
    /// * `tolerance` - Observation tolerance (Gaussian kernel width)
    /// * `dim_weights` - Per-dimension weights of the squared distance
    pub fn new(kernel: LikelihoodKernel, tolerance: f64, dim_weights: Vec<f64>) -> Self {
        Self {
            kernel,
            tolerance,
            dim_weights,
        }
    }

    pub fn kernel(&self) -> LikelihoodKernel {
        self.kernel
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn dim_weights(&self) -> &[f64] {
        &self.dim_weights
    }

    /// Observation a particle expects: the template frame at `alignment`,
    /// scaled and rotated.
    ///
    /// Returns `None` for an empty template.
    pub fn predict<R1, S1, R2, S2>(
        &self,
        template: &GestureTemplate,
        alignment: f64,
        scalings: &Matrix<f64, R1, U1, S1>,
        rotations: &Matrix<f64, R2, U1, S2>,
    ) -> Option<DVector<f64>>
    where
        R1: Dim,
        S1: RawStorage<f64, R1, U1>,
        R2: Dim,
        S2: RawStorage<f64, R2, U1>,
    {
        let frame = template.frame_at(alignment)?;
        Some(transform_frame(frame, scalings, rotations))
    }

    /// Likelihood of `observation` given the predicted observation.
    pub fn score(&self, predicted: &DVector<f64>, observation: &DVector<f64>) -> f64 {
        let distance = weighted_squared_distance(predicted, observation, &self.dim_weights);
        self.kernel.evaluate(distance, self.tolerance)
    }

    /// Predict and score in one step.
    ///
    /// An empty template yields a likelihood of 0.
    pub fn likelihood<R1, S1, R2, S2>(
        &self,
        template: &GestureTemplate,
        alignment: f64,
        scalings: &Matrix<f64, R1, U1, S1>,
        rotations: &Matrix<f64, R2, U1, S2>,
        observation: &DVector<f64>,
    ) -> f64
    where
        R1: Dim,
        S1: RawStorage<f64, R1, U1>,
        R2: Dim,
        S2: RawStorage<f64, R2, U1>,
    {
        match self.predict(template, alignment, scalings, rotations) {
            Some(predicted) => self.score(&predicted, observation),
            None => 0.0,
        }
    }
}

impl Default for ObservationModel {
    fn default() -> Self {
        Self::new(LikelihoodKernel::default(), 0.2, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line_template() -> GestureTemplate {
        GestureTemplate::from_frames(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]).unwrap()
    }

    #[test]
    fn test_exact_match_has_unit_likelihood() {
        let model = ObservationModel::new(LikelihoodKernel::default(), 0.5, vec![0.5, 0.5]);
        let template = line_template();
        let ones = DVector::from_element(2, 1.0);
        let zero = DVector::from_element(1, 0.0);

        let obs = DVector::from_vec(vec![1.0, 0.0]);
        let l = model.likelihood(&template, 0.5, &ones, &zero, &obs);
        assert_relative_eq!(l, 1.0);
    }

    #[test]
    fn test_gaussian_likelihood_value() {
        let model = ObservationModel::new(LikelihoodKernel::default(), 0.5, vec![0.5, 0.5]);
        let template = line_template();
        let ones = DVector::from_element(2, 1.0);
        let zero = DVector::from_element(1, 0.0);

        // frame index floor(0.1 * 3) = 0 -> (0, 0); distance = 0.5 * 1 = 0.5
        let obs = DVector::from_vec(vec![1.0, 0.0]);
        let l = model.likelihood(&template, 0.1, &ones, &zero, &obs);
        assert_relative_eq!(l, (-0.5f64 / 0.25).exp());
    }

    #[test]
    fn test_scaling_and_rotation_applied() {
        let model = ObservationModel::new(LikelihoodKernel::default(), 0.5, vec![0.5, 0.5]);
        let template = line_template();
        let scalings = DVector::from_vec(vec![2.0, 2.0]);
        let rotations = DVector::from_vec(vec![std::f64::consts::FRAC_PI_2]);

        let predicted = model.predict(&template, 0.5, &scalings, &rotations).unwrap();
        assert_relative_eq!(predicted[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(predicted[1], 2.0, epsilon = 1e-12);

        let obs = DVector::from_vec(vec![0.0, 2.0]);
        assert_relative_eq!(model.score(&predicted, &obs), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_student_t_likelihood() {
        let model = ObservationModel::new(LikelihoodKernel::from_distribution(2.0), 0.5, vec![1.0, 1.0]);
        let predicted = DVector::from_vec(vec![0.0, 0.0]);
        let obs = DVector::from_vec(vec![1.0, 1.0]);
        // distance 2, (2/2 + 1)^-2
        assert_relative_eq!(model.score(&predicted, &obs), 0.25);
    }

    #[test]
    fn test_empty_template_scores_zero() {
        let model = ObservationModel::default();
        let template = GestureTemplate::new(2);
        let ones = DVector::from_element(2, 1.0);
        let zero = DVector::from_element(1, 0.0);
        let obs = DVector::from_vec(vec![0.0, 0.0]);
        assert_eq!(model.likelihood(&template, 0.5, &ones, &zero, &obs), 0.0);
    }
}
