//! Update-to-data training driver.
//!
//! One [`Trainer::update`] call corresponds to one environment step of the
//! outer loop: it draws `utd` batches from a [`BatchSource`] and runs one
//! [`Drq::step`] on each. Around the core step the trainer adds the things
//! the core deliberately leaves out:
//!
//! - periodic metric logging (`log_every` updates) to a [`MetricsLogger`]
//! - checkpoint saving through a [`Checkpointer`]
//! - aborting on the first non-finite metric
//!
//! ```text
//! for _ in 0..utd:
//!     batch          = source.sample(batch_size)      (stop early on None)
//!     state, metrics = drq.step(state, batch)
//!     non-finite?    → Err(NumericalFailure)
//!     log / checkpoint on cadence
//! return state, mean(metrics)
//! ```

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::algorithms::{Drq, DrqNetworks};
use crate::checkpoint::Checkpointer;
use crate::core::training_state::TrainingState;
use crate::core::transition::TransitionBatch;
use crate::error::{ConfigError, DrqError};
use crate::metrics::{DrqMetrics, MetricsLogger, UpdateSnapshot};

/// Supplier of training batches, typically a replay buffer.
pub trait BatchSource<B: Backend> {
    /// Draw a batch of `batch_size` transitions, or `None` when not enough
    /// data is available yet.
    fn sample(&mut self, batch_size: usize) -> Option<TransitionBatch<B>>;
}

/// Cadence settings of the training driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Updates per [`Trainer::update`] call (update-to-data ratio).
    pub utd: usize,
    /// Log every N-th update.
    pub log_every: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            utd: 10,
            log_every: 5,
        }
    }
}

impl TrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_utd(mut self, utd: usize) -> Self {
        self.utd = utd;
        self
    }

    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.utd == 0 {
            return Err(ConfigError::InvalidCount {
                field: "utd",
                value: self.utd,
            });
        }
        if self.log_every == 0 {
            return Err(ConfigError::InvalidCount {
                field: "log_every",
                value: self.log_every,
            });
        }
        Ok(())
    }
}

/// Runs DrQ updates with logging, checkpointing and NaN detection.
pub struct Trainer {
    drq: Drq,
    config: TrainerConfig,
    logger: Option<Box<dyn MetricsLogger>>,
    checkpointer: Option<Checkpointer>,
}

impl Trainer {
    pub fn new(drq: Drq, config: TrainerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            drq,
            config,
            logger: None,
            checkpointer: None,
        })
    }

    pub fn with_logger<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.logger = Some(Box::new(logger));
        self
    }

    pub fn with_checkpointer(mut self, checkpointer: Checkpointer) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn drq(&self) -> &Drq {
        &self.drq
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run up to `utd` updates.
    ///
    /// Returns the new state and the mean metrics of the updates performed,
    /// or `None` if the source had no batch at all.
    pub fn update<B, M, O, S>(
        &mut self,
        state: TrainingState<B, M, O>,
        source: &mut S,
    ) -> Result<(TrainingState<B, M, O>, Option<DrqMetrics>), DrqError>
    where
        B: AutodiffBackend,
        M: DrqNetworks<B> + AutodiffModule<B>,
        O: Optimizer<M, B>,
        S: BatchSource<B>,
    {
        let batch_size = self.drq.config().batch_size;
        let mut state = state;
        let mut history = Vec::with_capacity(self.config.utd);

        for _ in 0..self.config.utd {
            let Some(batch) = source.sample(batch_size) else {
                log::debug!("Batch source exhausted after {} updates", history.len());
                break;
            };

            let (next, metrics) = self.drq.step(state, &batch)?;
            state = next;
            let step = state.step();

            if let Some((metric, value)) = metrics.first_non_finite() {
                log::error!("Non-finite {} ({}) at step {}, aborting", metric, value, step);
                return Err(DrqError::NumericalFailure {
                    step,
                    metric,
                    value,
                });
            }

            if step % self.config.log_every == 0 {
                self.log(step, &metrics, state.learning_rate());
            }

            if let Some(checkpointer) = &self.checkpointer {
                if checkpointer.should_save(step) {
                    checkpointer.save(&state)?;
                }
            }

            history.push(metrics);
        }

        Ok((state, DrqMetrics::mean(&history)))
    }

    /// Call [`Trainer::update`] `iterations` times and flush the logger.
    pub fn run<B, M, O, S>(
        &mut self,
        state: TrainingState<B, M, O>,
        source: &mut S,
        iterations: usize,
    ) -> Result<TrainingState<B, M, O>, DrqError>
    where
        B: AutodiffBackend,
        M: DrqNetworks<B> + AutodiffModule<B>,
        O: Optimizer<M, B>,
        S: BatchSource<B>,
    {
        log::info!(
            "Training for {} iterations ({} updates each, batch {})",
            iterations,
            self.config.utd,
            self.drq.config().batch_size
        );

        let mut state = state;
        for _ in 0..iterations {
            state = self.update(state, source)?.0;
        }

        if let Some(logger) = self.logger.as_mut() {
            logger.flush();
        }
        log::info!("Training finished at step {}", state.step());
        Ok(state)
    }

    fn log(&mut self, step: usize, metrics: &DrqMetrics, learning_rate: f64) {
        log::info!(
            "step {}: critic_loss {:.4}, actor_loss {:.4}, entropy {:.4}, reward {:.3}, value {:.3}, grad_norm {:.3}",
            step,
            metrics.critic_loss,
            metrics.actor_loss,
            metrics.entropy,
            metrics.reward,
            metrics.value,
            metrics.grad_norm
        );
        if let Some(logger) = self.logger.as_mut() {
            logger.log(&UpdateSnapshot::new(step, *metrics).with_learning_rate(learning_rate));
        }
    }
}
