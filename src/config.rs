//! Follower configuration and parameters.
//!
//! `Parameters` is a plain value: the follower replaces it wholesale and
//! recomputes everything derived from it ([`NoiseModel`], tolerance, dimension
//! weights) whenever it or the vocabulary changes.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::likelihood::LikelihoodKernel;
use crate::utils::broadcast;

/// Hard minimum number of particles.
pub const MIN_PARTICLES: usize = 4;

/// Tolerance used when a manual tolerance is not strictly positive.
pub const FALLBACK_TOLERANCE: f64 = 0.1;

/// Heuristic divisor applied to the mean template range to derive the tolerance.
pub const TOLERANCE_RANGE_DIVISOR: f64 = 4.0;

/// Number of dynamics components (speed, acceleration).
pub const DYNAMICS_DIMENSIONS: usize = 2;

/// Interval `[center - range/2, center + range/2)` used to spread initial particle values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub center: f64,
    pub range: f64,
}

impl Spread {
    pub const fn new(center: f64, range: f64) -> Self {
        Self { center, range }
    }

    /// Map a unit sample `u` in `[0, 1)` into the interval.
    #[inline]
    pub fn at(&self, u: f64) -> f64 {
        (u - 0.5) * self.range + self.center
    }
}

/// Particle filter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Number of particles (at least 4).
    pub number_of_particles: usize,

    /// Resample when the effective sample count falls below this value.
    pub resampling_threshold: usize,

    /// Observation tolerance. `None` derives it from the template value ranges.
    pub tolerance: Option<f64>,

    /// Kernel selector: 0 = Gaussian, > 0 = Student's-t with this many degrees of freedom.
    pub distribution: f64,

    /// Prediction sub-steps applied per observation (at least 1).
    pub prediction_steps: usize,

    /// Standard deviation of the alignment random walk.
    pub alignment_sigma: f64,

    /// Standard deviations of the dynamics random walk (speed, acceleration).
    pub dynamics_sigma: Vec<f64>,

    /// Standard deviations of the scalings random walk (one per input dimension).
    pub scalings_sigma: Vec<f64>,

    /// Standard deviations of the rotations random walk (1 for 2D, 3 for 3D input).
    pub rotations_sigma: Vec<f64>,

    pub alignment_spread: Spread,
    pub dynamics_spread: Spread,
    pub scalings_spread: Spread,
    pub rotations_spread: Spread,

    /// Per-dimension weights of the squared distance. `None` means uniform `1/D`.
    pub dim_weights: Option<Vec<f64>>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            number_of_particles: 1000,
            resampling_threshold: 250,
            tolerance: None,
            distribution: 0.0,
            prediction_steps: 1,
            alignment_sigma: 0.000001f64.sqrt(),
            dynamics_sigma: vec![0.001f64.sqrt()],
            scalings_sigma: vec![0.00001f64.sqrt()],
            rotations_sigma: vec![0.0],
            alignment_spread: Spread::new(0.0, 0.2),
            dynamics_spread: Spread::new(1.0, 0.3),
            scalings_spread: Spread::new(1.0, 0.3),
            rotations_spread: Spread::new(0.0, 0.5),
            dim_weights: None,
        }
    }
}

impl Parameters {
    /// Return a copy with every out-of-range value clamped to a valid one.
    ///
    /// - fewer than 4 particles -> 4
    /// - resampling threshold >= particle count -> particle count / 2
    /// - 0 prediction steps -> 1
    /// - manual tolerance <= 0 -> 0.1
    pub fn normalized(mut self) -> Self {
        if self.number_of_particles < MIN_PARTICLES {
            warn!(
                "number_of_particles {} below minimum, using {}",
                self.number_of_particles, MIN_PARTICLES
            );
            self.number_of_particles = MIN_PARTICLES;
        }
        if self.resampling_threshold >= self.number_of_particles {
            let threshold = self.number_of_particles / 2;
            warn!(
                "resampling_threshold {} not below particle count {}, using {}",
                self.resampling_threshold, self.number_of_particles, threshold
            );
            self.resampling_threshold = threshold;
        }
        if self.prediction_steps == 0 {
            warn!("prediction_steps must be at least 1");
            self.prediction_steps = 1;
        }
        if let Some(tolerance) = self.tolerance {
            if tolerance <= 0.0 || tolerance.is_nan() {
                warn!("tolerance {} not positive, using {}", tolerance, FALLBACK_TOLERANCE);
                self.tolerance = Some(FALLBACK_TOLERANCE);
            }
        }
        if self.distribution < 0.0 || self.distribution.is_nan() {
            warn!("distribution {} invalid, using Gaussian kernel", self.distribution);
            self.distribution = 0.0;
        }
        self
    }

    /// Likelihood kernel selected by `distribution`.
    pub fn kernel(&self) -> LikelihoodKernel {
        LikelihoodKernel::from_distribution(self.distribution)
    }
}

/// Follower configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    /// Subtract each particle's offset from the live observation.
    pub translate: bool,

    /// Treat alignment overflow as the end of a gesture segment.
    pub segmentation: bool,

    /// Particle filter parameters.
    pub parameters: Parameters,
}

impl FollowerConfig {
    /// Create a configuration with the given parameters and default flags.
    pub fn new(parameters: Parameters) -> Self {
        Self {
            translate: true,
            segmentation: false,
            parameters,
        }
    }
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self::new(Parameters::default())
    }
}

/// Rotation state dimensionality for a given input dimensionality.
pub fn rotation_dimensions(input_dimensions: usize) -> usize {
    match input_dimensions {
        2 => 1,
        3 => 3,
        _ => 0,
    }
}

/// Noise and weighting vectors derived from [`Parameters`] for one input dimensionality.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseModel {
    pub input_dimensions: usize,
    pub alignment_sigma: f64,
    pub dynamics_sigma: Vec<f64>,
    pub scalings_sigma: Vec<f64>,
    pub rotations_sigma: Vec<f64>,
    pub dim_weights: Vec<f64>,
}

impl NoiseModel {
    /// Derive the noise model for `input_dimensions`-dimensional input.
    ///
    /// Sigma vectors whose length does not match their feature group are
    /// broadcast from their first element.
    pub fn derive(parameters: &Parameters, input_dimensions: usize) -> Self {
        let rotation_dims = rotation_dimensions(input_dimensions);

        let dim_weights = match &parameters.dim_weights {
            Some(weights) if weights.len() == input_dimensions => weights.clone(),
            _ => vec![1.0 / input_dimensions.max(1) as f64; input_dimensions],
        };

        Self {
            input_dimensions,
            alignment_sigma: parameters.alignment_sigma,
            dynamics_sigma: broadcast(&parameters.dynamics_sigma, DYNAMICS_DIMENSIONS),
            scalings_sigma: broadcast(&parameters.scalings_sigma, input_dimensions),
            rotations_sigma: broadcast(&parameters.rotations_sigma, rotation_dims),
            dim_weights,
        }
    }

    pub fn rotation_dimensions(&self) -> usize {
        self.rotations_sigma.len()
    }
}
