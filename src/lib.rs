//! # GVF - Gesture Variation Follower
//!
//! Early, continuous gesture recognition and variation tracking.
//!
//! Given one or more recorded example sequences ("templates") and a live stream of
//! multi-dimensional observations, the follower runs a particle filter that estimates,
//! frame by frame and before the gesture is finished:
//!
//! - which template the live gesture most resembles
//! - its phase (alignment) within that template
//! - its relative speed and acceleration
//! - its relative scale and rotation
//!
//! ## Example
//!
//! ```rust,ignore
//! use gvf_rs::{FollowerConfig, GestureFollower, State};
//!
//! let mut follower = GestureFollower::new(FollowerConfig::default());
//!
//! // Record a template
//! follower.set_state(State::Learning, None);
//! for frame in [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]] {
//!     follower.add_observation(&frame).unwrap();
//! }
//!
//! // Follow a live gesture
//! follower.set_state(State::Following, None);
//! let outcome = follower.update(&[0.0, 0.0]).unwrap();
//! println!("most probable: {:?}", outcome.most_probable);
//! ```

// Public modules
pub mod config;
pub mod estimator;
pub mod follower;
pub mod gesture;
pub mod io;
pub mod likelihood;
pub mod particles;
pub mod sampling;
pub mod templates;
pub mod utils;

// Re-exports for convenience
pub use config::{FollowerConfig, NoiseModel, Parameters, Spread};
pub use estimator::{Estimator, GestureEstimate, Outcome};
pub use follower::{GestureFollower, State};
pub use gesture::GestureTemplate;
pub use likelihood::{LikelihoodKernel, ObservationModel};
pub use particles::{ParticleId, ParticlePopulation, ParticleSnapshot, Resampler, TransitionModel};
pub use templates::{TemplateId, TemplateStore};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the gesture follower
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Dimension mismatch: expected {expected}, got {got}")]
        DimensionMismatch { expected: usize, got: usize },

        #[error("Operation '{operation}' is not valid in state {state}")]
        InvalidState { state: String, operation: String },

        #[error("Unknown template id: {0}")]
        InvalidTemplateId(usize),

        #[error("Gesture template is empty")]
        EmptyTemplate,

        #[error("Parse error at line {line}: {message}")]
        Parse { line: usize, message: String },

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for gesture follower operations
    pub type Result<T> = std::result::Result<T, Error>;
}
