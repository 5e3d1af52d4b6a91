//! Core data structures: randomness, transitions, target tracking and the
//! training-state container.

pub mod gradients;
pub mod rng;
pub mod target_network;
pub mod training_state;
pub mod transition;

pub use gradients::{clip_by_global_norm, global_norm};
pub use rng::{standard_normal, PrngKey};
pub use target_network::{hard_copy, soft_update, TargetUpdate};
pub use training_state::{OptimizerSettings, TrainingState};
pub use transition::{ImageObservation, ImageTransition, Observation, TransitionBatch};
