//! Run configuration.
//!
//! [`CoderConfig`] carries every recognized option with its default and
//! derives the per-component configurations from it. Files are JSON; missing
//! fields take their defaults and unknown fields are ignored.
//!
//! ```json
//! {
//!   "drq_batch_size": 64,
//!   "drq_targets_update": 1000,
//!   "ensemble_size": 5,
//!   "num_critics": 2
//! }
//! ```
//!
//! `drq_targets_update` selects the target tracking discipline: an integer is
//! a periodic hard copy every N updates, a float is an exponential moving
//! average rate.

use std::fs;
use std::path::{Path, PathBuf};

use burn::optim::AdamWConfig;
use serde::{Deserialize, Serialize};

use crate::algorithms::{CriticReduction, DrqConfig};
use crate::checkpoint::CheckpointerConfig;
use crate::core::target_network::TargetUpdate;
use crate::core::training_state::OptimizerSettings;
use crate::error::ConfigError;
use crate::nn::CoderNetworksConfig;
use crate::runners::TrainerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoderConfig {
    // Representation learning
    pub shift: usize,
    pub byol_batch_size: usize,
    pub byol_learning_rate: f64,
    pub byol_targets_update: f32,
    pub byol_steps: usize,

    // Control
    pub gamma: f32,
    #[serde(alias = "lambda_")]
    pub entropy_coef: f32,
    pub utd: usize,
    /// The next-state embedding always comes from the detached target
    /// encoder; `false` is rejected by `validate`.
    pub detach_encoder: bool,
    pub drq_batch_size: usize,
    pub drq_learning_rate: f64,
    pub drq_targets_update: TargetUpdate,
    pub log_every: usize,
    pub pretrain_steps: usize,

    // Architecture
    pub cnn_emb_dim: usize,
    pub cnn_depths: Vec<usize>,
    pub cnn_kernels: Vec<usize>,
    pub cnn_strides: Vec<usize>,
    pub critic_layers: Vec<usize>,
    pub actor_layers: Vec<usize>,
    pub ensemble_size: usize,
    pub num_critics: usize,
    pub critic_reduction: CriticReduction,

    // Common
    pub replay_capacity: usize,
    pub max_grad: f32,
    pub weight_decay: f32,
    pub logdir: PathBuf,
    pub task: String,
    pub time_limit: usize,
    pub seed: u64,
    pub checkpoint_every: usize,
    pub keep_checkpoints: usize,
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            shift: 4,
            byol_batch_size: 32,
            byol_learning_rate: 1e-3,
            byol_targets_update: 5e-3,
            byol_steps: 1000,

            gamma: 0.98,
            entropy_coef: 1.0,
            utd: 10,
            detach_encoder: true,
            drq_batch_size: 32,
            drq_learning_rate: 1e-3,
            drq_targets_update: TargetUpdate::Exponential(1e-2),
            log_every: 5,
            pretrain_steps: 40,

            cnn_emb_dim: 64,
            cnn_depths: vec![64, 64, 64, 64],
            cnn_kernels: vec![3, 3, 3, 3],
            cnn_strides: vec![2, 2, 2, 2],
            critic_layers: vec![64, 64, 64],
            actor_layers: vec![64, 64],
            ensemble_size: 2,
            num_critics: 2,
            critic_reduction: CriticReduction::Sum,

            replay_capacity: 10_000,
            max_grad: 50.0,
            weight_decay: 1e-6,
            logdir: PathBuf::from("logdir"),
            task: "test".to_string(),
            time_limit: 1,
            seed: 0,
            checkpoint_every: 1000,
            keep_checkpoints: 5,
        }
    }
}

impl CoderConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("byol_batch_size", self.byol_batch_size),
            ("time_limit", self.time_limit),
            ("replay_capacity", self.replay_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidCount { field, value });
            }
        }

        if !self.weight_decay.is_finite() || self.weight_decay < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "weight_decay",
                value: self.weight_decay as f64,
                min: 0.0,
                max: f64::INFINITY,
            });
        }

        if !self.detach_encoder {
            return Err(ConfigError::Architecture(
                "detach_encoder = false is not supported".to_string(),
            ));
        }

        let n = self.cnn_depths.len();
        if self.cnn_kernels.len() != n || self.cnn_strides.len() != n {
            return Err(ConfigError::Architecture(format!(
                "cnn_depths, cnn_kernels and cnn_strides have lengths {}, {}, {}",
                n,
                self.cnn_kernels.len(),
                self.cnn_strides.len()
            )));
        }

        self.drq_config().validate()?;
        self.trainer_config().validate()?;
        self.target_update().validate()?;
        self.pretraining_target_update().validate()?;
        self.optimizer_settings().validate()?;
        self.pretraining_optimizer_settings().validate()?;
        Ok(())
    }

    pub fn drq_config(&self) -> DrqConfig {
        DrqConfig::new()
            .with_batch_size(self.drq_batch_size)
            .with_gamma(self.gamma)
            .with_entropy_coef(self.entropy_coef)
            .with_ensemble(self.ensemble_size, self.num_critics)
            .with_shift(self.shift)
            .with_critic_reduction(self.critic_reduction)
    }

    /// Target tracking of the control phase.
    pub fn target_update(&self) -> TargetUpdate {
        self.drq_targets_update
    }

    /// Target tracking of the representation-learning phase.
    pub fn pretraining_target_update(&self) -> TargetUpdate {
        TargetUpdate::Exponential(self.byol_targets_update)
    }

    pub fn optimizer_settings(&self) -> OptimizerSettings {
        OptimizerSettings::new(self.drq_learning_rate).with_max_grad_norm(Some(self.max_grad))
    }

    pub fn pretraining_optimizer_settings(&self) -> OptimizerSettings {
        OptimizerSettings::new(self.byol_learning_rate).with_max_grad_norm(Some(self.max_grad))
    }

    /// AdamW with the configured weight decay.
    pub fn optimizer_config(&self) -> AdamWConfig {
        AdamWConfig::new().with_weight_decay(self.weight_decay)
    }

    pub fn checkpointer_config(&self) -> CheckpointerConfig {
        CheckpointerConfig::new(self.logdir.join("checkpoints"))
            .with_save_interval(self.checkpoint_every)
            .with_keep_last_n(self.keep_checkpoints)
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig::new()
            .with_utd(self.utd)
            .with_log_every(self.log_every)
    }

    /// Reference network architecture for the given observation and action
    /// spaces.
    pub fn networks_config(
        &self,
        image_shape: [usize; 3],
        feature_dim: usize,
        action_dim: usize,
    ) -> CoderNetworksConfig {
        CoderNetworksConfig::new(image_shape, action_dim)
            .with_feature_dim(feature_dim)
            .with_cnn(
                self.cnn_emb_dim,
                self.cnn_depths.clone(),
                self.cnn_kernels.clone(),
                self.cnn_strides.clone(),
            )
            .with_actor_layers(self.actor_layers.clone())
            .with_critic_layers(self.critic_layers.clone())
            .with_ensemble_size(self.ensemble_size)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_logdir(mut self, logdir: impl Into<PathBuf>) -> Self {
        self.logdir = logdir.into();
        self
    }

    pub fn with_shift(mut self, shift: usize) -> Self {
        self.shift = shift;
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

    pub fn with_utd(mut self, utd: usize) -> Self {
        self.utd = utd;
        self
    }

    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }

    pub fn with_drq_batch_size(mut self, batch_size: usize) -> Self {
        self.drq_batch_size = batch_size;
        self
    }

    pub fn with_drq_learning_rate(mut self, learning_rate: f64) -> Self {
        self.drq_learning_rate = learning_rate;
        self
    }

    pub fn with_drq_targets_update(mut self, target_update: TargetUpdate) -> Self {
        self.drq_targets_update = target_update;
        self
    }

    pub fn with_ensemble(mut self, ensemble_size: usize, num_critics: usize) -> Self {
        self.ensemble_size = ensemble_size;
        self.num_critics = num_critics;
        self
    }

    pub fn with_cnn(
        mut self,
        emb_dim: usize,
        depths: Vec<usize>,
        kernels: Vec<usize>,
        strides: Vec<usize>,
    ) -> Self {
        self.cnn_emb_dim = emb_dim;
        self.cnn_depths = depths;
        self.cnn_kernels = kernels;
        self.cnn_strides = strides;
        self
    }

    pub fn with_actor_layers(mut self, layers: Vec<usize>) -> Self {
        self.actor_layers = layers;
        self
    }

    pub fn with_critic_layers(mut self, layers: Vec<usize>) -> Self {
        self.critic_layers = layers;
        self
    }

    pub fn with_checkpointing(mut self, every: usize, keep: usize) -> Self {
        self.checkpoint_every = every;
        self.keep_checkpoints = keep;
        self
    }
}
