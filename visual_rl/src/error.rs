//! Error taxonomy for the optimization engine.
//!
//! - [`ConfigError`]: invalid hyperparameters or parameter sets, raised when a
//!   state or algorithm is built. Fatal.
//! - [`ShapeError`]: a batch that disagrees with the configured shapes, raised
//!   at the start of an update step. Fatal for that call only.
//! - [`DrqError`]: umbrella type returned by the public API.
//!
//! Numerical failures (NaN/Inf) are not errors inside the core: they flow
//! through the returned metrics and it is the caller (see
//! [`crate::runners::Trainer`]) that turns them into
//! [`DrqError::NumericalFailure`].

use std::fmt;
use std::io;

use crate::checkpoint::CheckpointError;

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count parameter (batch size, ensemble size, ...) must be positive.
    InvalidCount {
        field: &'static str,
        value: usize,
    },
    /// A parameter is outside its valid range.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// The initial parameter set contains no trainable parameters.
    EmptyParameters,
    /// The target tracking configuration is invalid.
    InvalidTargetUpdate(String),
    /// `num_critics` exceeds `ensemble_size`.
    SubsetTooLarge {
        num_critics: usize,
        ensemble_size: usize,
    },
    /// Network layer lists are inconsistent or collapse the image.
    Architecture(String),
    /// Configuration file could not be parsed.
    Parse(String),
    /// Configuration file could not be read.
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCount { field, value } => {
                write!(f, "{} must be > 0, got {}", field, value)
            }
            ConfigError::OutOfRange { field, value, min, max } => {
                write!(f, "{} must be in [{}, {}], got {}", field, min, max, value)
            }
            ConfigError::EmptyParameters => write!(f, "initial parameter set is empty"),
            ConfigError::InvalidTargetUpdate(msg) => write!(f, "invalid target update: {}", msg),
            ConfigError::SubsetTooLarge { num_critics, ensemble_size } => write!(
                f,
                "num_critics ({}) must be <= ensemble_size ({})",
                num_critics, ensemble_size
            ),
            ConfigError::Architecture(msg) => write!(f, "invalid architecture: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::Io(msg) => write!(f, "config IO error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Batch shape or rank mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// A batch field's leading dimension differs from the configured batch size.
    BatchSize {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Current and next observation images have different shapes.
    ImageShape {
        observation: [usize; 4],
        next_observation: [usize; 4],
    },
    /// Only one of the two observations carries proprioceptive features,
    /// or their widths differ.
    FeatureMismatch,
    /// More critics requested than the ensemble holds.
    EnsembleSubsample {
        requested: usize,
        ensemble_size: usize,
    },
    /// Batch action width differs from the policy's action width.
    ActionDim { expected: usize, actual: usize },
    /// Host-side transitions could not be stacked.
    Ragged(String),
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::BatchSize { field, expected, actual } => write!(
                f,
                "{} has leading dimension {}, expected batch size {}",
                field, actual, expected
            ),
            ShapeError::ImageShape { observation, next_observation } => write!(
                f,
                "observation image shape {:?} differs from next observation {:?}",
                observation, next_observation
            ),
            ShapeError::FeatureMismatch => {
                write!(f, "observation and next observation features disagree")
            }
            ShapeError::EnsembleSubsample { requested, ensemble_size } => write!(
                f,
                "cannot sample {} critics from an ensemble of {}",
                requested, ensemble_size
            ),
            ShapeError::ActionDim { expected, actual } => {
                write!(f, "action width {} differs from policy width {}", actual, expected)
            }
            ShapeError::Ragged(msg) => write!(f, "ragged transitions: {}", msg),
        }
    }
}

impl std::error::Error for ShapeError {}

/// Umbrella error for the public API.
#[derive(Debug)]
pub enum DrqError {
    Config(ConfigError),
    Shape(ShapeError),
    Checkpoint(CheckpointError),
    /// A non-finite metric was observed by the training loop.
    NumericalFailure { step: usize, metric: &'static str, value: f32 },
}

impl fmt::Display for DrqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrqError::Config(e) => write!(f, "configuration error: {}", e),
            DrqError::Shape(e) => write!(f, "shape error: {}", e),
            DrqError::Checkpoint(e) => write!(f, "checkpoint error: {}", e),
            DrqError::NumericalFailure { step, metric, value } => write!(
                f,
                "non-finite {} ({}) at step {}",
                metric, value, step
            ),
        }
    }
}

impl std::error::Error for DrqError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DrqError::Config(e) => Some(e),
            DrqError::Shape(e) => Some(e),
            DrqError::Checkpoint(e) => Some(e),
            DrqError::NumericalFailure { .. } => None,
        }
    }
}

impl From<ConfigError> for DrqError {
    fn from(e: ConfigError) -> Self {
        DrqError::Config(e)
    }
}

impl From<ShapeError> for DrqError {
    fn from(e: ShapeError) -> Self {
        DrqError::Shape(e)
    }
}

impl From<CheckpointError> for DrqError {
    fn from(e: CheckpointError) -> Self {
        DrqError::Checkpoint(e)
    }
}

/// Result alias for the public API.
pub type Result<T> = std::result::Result<T, DrqError>;
