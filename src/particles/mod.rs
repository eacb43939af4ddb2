//! Particle filter state and its update steps.
//!
//! This module provides:
//! - `ParticlePopulation` - column-per-particle state storage
//! - `TransitionModel` - initial spreading, random-walk prediction, boundary handling
//! - `Resampler` - effective-sample-size triggered systematic resampling

mod population;
mod resample;
mod transition;

pub use population::{ParticleId, ParticlePopulation, ParticleSnapshot};
pub use resample::Resampler;
pub use transition::{BoundaryEvent, TransitionModel};
