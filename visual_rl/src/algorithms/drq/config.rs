//! DrQ update configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Critic loss reduction
// ============================================================================

/// How the squared errors of the ensemble members are combined per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriticReduction {
    #[default]
    Sum,
    Mean,
}

// ============================================================================
// DrQ Configuration
// ============================================================================

/// Hyperparameters of the DrQ update step.
#[derive(Debug, Clone, PartialEq)]
pub struct DrqConfig {
    /// Expected leading dimension of every batch.
    pub batch_size: usize,
    /// Discount factor γ.
    pub gamma: f32,
    /// Entropy coefficient α.
    pub entropy_coef: f32,
    /// Number of critic heads in the ensemble.
    pub ensemble_size: usize,
    /// Critics sampled (without replacement) for the bootstrap minimum.
    pub num_critics: usize,
    /// Maximum augmentation pixel shift.
    pub shift: usize,
    pub critic_reduction: CriticReduction,
}

impl Default for DrqConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            gamma: 0.98,
            entropy_coef: 1.0,
            ensemble_size: 2,
            num_critics: 2,
            shift: 4,
            critic_reduction: CriticReduction::Sum,
        }
    }
}

impl DrqConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_entropy_coef(mut self, entropy_coef: f32) -> Self {
        self.entropy_coef = entropy_coef;
        self
    }

    /// Set ensemble size and the number of sampled critics.
    pub fn with_ensemble(mut self, ensemble_size: usize, num_critics: usize) -> Self {
        self.ensemble_size = ensemble_size;
        self.num_critics = num_critics;
        self
    }

    pub fn with_shift(mut self, shift: usize) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_critic_reduction(mut self, reduction: CriticReduction) -> Self {
        self.critic_reduction = reduction;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("batch_size", self.batch_size),
            ("ensemble_size", self.ensemble_size),
            ("num_critics", self.num_critics),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidCount { field, value });
            }
        }

        if self.num_critics > self.ensemble_size {
            return Err(ConfigError::SubsetTooLarge {
                num_critics: self.num_critics,
                ensemble_size: self.ensemble_size,
            });
        }

        if !self.gamma.is_finite() || !(0.0..=1.0).contains(&self.gamma) {
            return Err(ConfigError::OutOfRange {
                field: "gamma",
                value: self.gamma as f64,
                min: 0.0,
                max: 1.0,
            });
        }

        if !self.entropy_coef.is_finite() || self.entropy_coef < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "entropy_coef",
                value: self.entropy_coef as f64,
                min: 0.0,
                max: f64::INFINITY,
            });
        }

        Ok(())
    }
}
