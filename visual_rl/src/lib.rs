//! # visual_rl: DrQ-style visual actor-critic optimization
//!
//! Off-policy, entropy-regularized actor-critic training from pixels, built
//! on burn. The core is a deterministic, checkpointable update step:
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  BatchSource ──batch──► Trainer (utd loop, logging, checkpoints)   │
//! │                            │                                       │
//! │                            ▼                                       │
//! │                    Drq::step(state, batch)                         │
//! │      ┌─────────────────────┼──────────────────────────┐            │
//! │      │ RandomShift         │ DrqNetworks              │            │
//! │      │ (per-sample crop)   │ encode / policy / critic │            │
//! │      └─────────────────────┼──────────────────────────┘            │
//! │                            ▼                                       │
//! │           TrainingState::apply(mean gradient)                      │
//! │   clip → AdamW → step += 1 → target sync (periodic | exponential)  │
//! │                            │                                       │
//! │                            ▼                                       │
//! │                 new TrainingState + DrqMetrics                     │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! All randomness flows from the [`PrngKey`] stored in the training state.
//! Each step splits it into independent streams and stores a fresh one, so
//! the same seed, initial parameters and batches reproduce a run exactly.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use visual_rl::{CoderConfig, Drq, PrngKey, TrainingState};
//!
//! let config = CoderConfig::from_json_file("config.json")?;
//! let networks = config.networks_config([3, 64, 64], 0, 6).init(&device)?;
//! let state = TrainingState::init(
//!     PrngKey::new(config.seed),
//!     networks,
//!     config.optimizer_config().init(),
//!     config.optimizer_settings(),
//!     config.target_update(),
//! )?;
//!
//! let drq = Drq::new(config.drq_config())?;
//! let (state, metrics) = drq.step(state, &batch)?;
//! ```

pub mod algorithms;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod error;
pub mod metrics;
pub mod nn;
pub mod runners;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use algorithms::{
    Augmentation, CriticReduction, DiagGaussian, Drq, DrqConfig, DrqNetworks, RandomShift,
    StepStreams,
};
pub use checkpoint::{CheckpointError, Checkpointer, CheckpointerConfig};
pub use config::CoderConfig;
pub use crate::core::{
    ImageObservation, ImageTransition, Observation, OptimizerSettings, PrngKey, TargetUpdate,
    TrainingState, TransitionBatch,
};
pub use error::{ConfigError, DrqError, ShapeError};
pub use metrics::{ConsoleLogger, CsvLogger, DrqMetrics, MetricsLogger, MultiLogger};
pub use nn::{CoderNetworks, CoderNetworksConfig};
pub use runners::{BatchSource, Trainer, TrainerConfig};
