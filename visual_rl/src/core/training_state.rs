//! Immutable training-state container.
//!
//! A [`TrainingState`] bundles everything a run needs to resume: the live
//! networks, their lagging target copy, the optimizer state, the randomness
//! cursor and the update counter. It is never mutated in place. Both
//! [`TrainingState::apply`] and [`TrainingState::with_rng`] consume the
//! state and return the next snapshot; clone a snapshot to keep it around
//! (e.g. for a checkpoint writer).
//!
//! # Lifecycle
//!
//! ```text
//! init(rng, params, optimizer, settings, target_update)   target := params
//!   └─ apply(grads)   clip → optimizer step → step += 1 → target sync
//!   └─ with_rng(key)  replace the randomness cursor
//! ```
//!
//! The same container serves the representation-learning phase, which only
//! differs by the target tracking discipline it is created with.

use std::fmt;
use std::marker::PhantomData;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use super::gradients::clip_by_global_norm;
use super::rng::PrngKey;
use super::target_network::TargetUpdate;
use crate::error::ConfigError;

/// Learning-rate and clipping settings of the optimizer transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub learning_rate: f64,
    /// Clip-by-global-norm threshold. `None` disables clipping.
    pub max_grad_norm: Option<f32>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            max_grad_norm: Some(50.0),
        }
    }
}

impl OptimizerSettings {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            max_grad_norm: None,
        }
    }

    pub fn with_max_grad_norm(mut self, max_grad_norm: Option<f32>) -> Self {
        self.max_grad_norm = max_grad_norm;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "learning_rate",
                value: self.learning_rate,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        if let Some(max) = self.max_grad_norm {
            if !max.is_finite() || max <= 0.0 {
                return Err(ConfigError::OutOfRange {
                    field: "max_grad_norm",
                    value: max as f64,
                    min: 0.0,
                    max: f64::INFINITY,
                });
            }
        }
        Ok(())
    }
}

/// Versioned snapshot of live/target parameters, optimizer state and RNG.
pub struct TrainingState<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    params: M,
    target_params: M,
    optimizer: O,
    rng: PrngKey,
    settings: OptimizerSettings,
    target_update: TargetUpdate,
    step: usize,
    _backend: PhantomData<B>,
}

impl<B, M, O> TrainingState<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    /// Create the initial snapshot. The target starts as an exact copy of
    /// `params` and the step counter at zero.
    pub fn init(
        rng: PrngKey,
        params: M,
        optimizer: O,
        settings: OptimizerSettings,
        target_update: TargetUpdate,
    ) -> Result<Self, ConfigError> {
        if params.num_params() == 0 {
            return Err(ConfigError::EmptyParameters);
        }
        settings.validate()?;
        target_update.validate()?;

        log::debug!(
            "Initialized training state: {} parameters, target {}, lr {}",
            params.num_params(),
            target_update,
            settings.learning_rate
        );

        Ok(Self {
            target_params: params.clone(),
            params,
            optimizer,
            rng,
            settings,
            target_update,
            step: 0,
            _backend: PhantomData,
        })
    }

    /// Reassemble a snapshot from restored parts.
    pub(crate) fn from_parts(
        params: M,
        target_params: M,
        optimizer: O,
        rng: PrngKey,
        settings: OptimizerSettings,
        target_update: TargetUpdate,
        step: usize,
    ) -> Self {
        Self {
            params,
            target_params,
            optimizer,
            rng,
            settings,
            target_update,
            step,
            _backend: PhantomData,
        }
    }

    /// Apply one gradient update and return the next snapshot.
    ///
    /// This is the only operation that changes parameters. The randomness
    /// cursor is carried over untouched.
    pub fn apply(mut self, mut grads: GradientsParams) -> Self {
        if let Some(max_norm) = self.settings.max_grad_norm {
            clip_by_global_norm::<B, M>(&self.params, &mut grads, max_norm);
        }

        let params = self
            .optimizer
            .step(self.settings.learning_rate, self.params, grads);
        self.step += 1;
        self.target_params = self
            .target_update
            .sync::<B, M>(&params, self.target_params, self.step);
        self.params = params;
        self
    }

    /// Replace the randomness cursor.
    pub fn with_rng(mut self, rng: PrngKey) -> Self {
        self.rng = rng;
        self
    }

    pub fn params(&self) -> &M {
        &self.params
    }

    pub fn target_params(&self) -> &M {
        &self.target_params
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn rng(&self) -> &PrngKey {
        &self.rng
    }

    pub fn settings(&self) -> OptimizerSettings {
        self.settings
    }

    pub fn learning_rate(&self) -> f64 {
        self.settings.learning_rate
    }

    pub fn max_grad_norm(&self) -> Option<f32> {
        self.settings.max_grad_norm
    }

    pub fn target_update(&self) -> TargetUpdate {
        self.target_update
    }

    /// Number of updates applied so far.
    pub fn step(&self) -> usize {
        self.step
    }
}

impl<B, M, O> Clone for TrainingState<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B> + Clone,
{
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            target_params: self.target_params.clone(),
            optimizer: self.optimizer.clone(),
            rng: self.rng.clone(),
            settings: self.settings,
            target_update: self.target_update,
            step: self.step,
            _backend: PhantomData,
        }
    }
}

impl<B, M, O> fmt::Debug for TrainingState<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingState")
            .field("step", &self.step)
            .field("num_params", &self.params.num_params())
            .field("target_update", &self.target_update)
            .field("settings", &self.settings)
            .field("rng", &self.rng)
            .finish()
    }
}
