//! Training drivers.
//!
//! - [`Trainer`]: update-to-data loop over a [`BatchSource`] with metric
//!   logging, checkpointing and non-finite abort

pub mod trainer;

pub use trainer::{BatchSource, Trainer, TrainerConfig};
