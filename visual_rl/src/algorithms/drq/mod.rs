//! DrQ: data-regularized Q-learning for visual control.
//!
//! An off-policy, entropy-regularized actor-critic update on augmented
//! images, with an ensemble critic and a lagging target copy of all
//! networks.
//!
//! # Usage
//!
//! ```ignore
//! use visual_rl::algorithms::drq::{Drq, DrqConfig};
//!
//! let drq = Drq::new(DrqConfig::default().with_batch_size(32))?;
//! let (state, metrics) = drq.step(state, &batch)?;
//! ```

mod config;
mod drq;

pub use config::{CriticReduction, DrqConfig};
pub use drq::{
    actor_loss, bootstrap_target, critic_loss, sample_critic_indices, subset_min, Drq,
    StepStreams,
};

#[cfg(test)]
mod tests;
