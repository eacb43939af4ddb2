//! Likelihood kernels: map a weighted squared distance to a likelihood.
//!
//! `LikelihoodKernel` wraps every supported kernel and dispatches without
//! vtable lookups, since it runs once per particle per observation.

/// Trait for distance-to-likelihood kernels.
pub trait Kernel: Send + Sync {
    /// Likelihood of an observation at weighted squared distance `distance`.
    fn evaluate(&self, distance: f64, tolerance: f64) -> f64;
}

/// Gaussian kernel: `exp(-distance / tolerance²)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GaussianKernel;

impl Kernel for GaussianKernel {
    #[inline]
    fn evaluate(&self, distance: f64, tolerance: f64) -> f64 {
        (-distance / (tolerance * tolerance)).exp()
    }
}

/// Student's-t kernel: `(distance / nu + 1)^(-nu/2 - 1)`.
///
/// Heavier tails than the Gaussian kernel; the tolerance is not used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudentTKernel {
    /// Degrees of freedom (> 0).
    pub nu: f64,
}

impl StudentTKernel {
    pub fn new(nu: f64) -> Self {
        Self { nu }
    }
}

impl Kernel for StudentTKernel {
    #[inline]
    fn evaluate(&self, distance: f64, _tolerance: f64) -> f64 {
        (distance / self.nu + 1.0).powf(-self.nu / 2.0 - 1.0)
    }
}

/// Enum-based kernel for static dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LikelihoodKernel {
    Gaussian(GaussianKernel),
    StudentT(StudentTKernel),
}

impl LikelihoodKernel {
    /// Kernel for a distribution selector: 0 (or less) = Gaussian, > 0 = Student's-t.
    pub fn from_distribution(distribution: f64) -> Self {
        if distribution > 0.0 {
            LikelihoodKernel::StudentT(StudentTKernel::new(distribution))
        } else {
            LikelihoodKernel::Gaussian(GaussianKernel)
        }
    }

    #[inline(always)]
    pub fn evaluate(&self, distance: f64, tolerance: f64) -> f64 {
        match self {
            LikelihoodKernel::Gaussian(k) => k.evaluate(distance, tolerance),
            LikelihoodKernel::StudentT(k) => k.evaluate(distance, tolerance),
        }
    }
}

impl Default for LikelihoodKernel {
    fn default() -> Self {
        LikelihoodKernel::Gaussian(GaussianKernel)
    }
}

impl Kernel for LikelihoodKernel {
    #[inline(always)]
    fn evaluate(&self, distance: f64, tolerance: f64) -> f64 {
        LikelihoodKernel::evaluate(self, distance, tolerance)
    }
}
