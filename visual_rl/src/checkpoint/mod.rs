//! Training-state checkpointing.
//!
//! Saves and restores complete [`TrainingState`](crate::core::TrainingState)
//! snapshots so that a run can be resumed exactly where it stopped.
//!
//! ## Features
//!
//! - Full-precision records: restoring and stepping reproduces the original run
//! - Checkpoint saving at configurable update intervals
//! - Automatic cleanup of old checkpoints
//! - Resume from the latest checkpoint
//!
//! ## Example
//!
//! ```rust,ignore
//! use visual_rl::checkpoint::{Checkpointer, CheckpointerConfig};
//!
//! let config = CheckpointerConfig::new("./logdir/checkpoints")
//!     .with_save_interval(1000)
//!     .with_keep_last_n(5);
//!
//! let checkpointer = Checkpointer::new(config)?;
//!
//! // In training loop:
//! if checkpointer.should_save(state.step()) {
//!     checkpointer.save(&state)?;
//! }
//!
//! // Resume training:
//! let state = checkpointer.load_latest(networks_template, optimizer, &device)?;
//! ```

pub mod checkpointer;

pub use checkpointer::{
    Checkpointer,
    CheckpointerConfig,
    CheckpointInfo,
    CheckpointError,
};
