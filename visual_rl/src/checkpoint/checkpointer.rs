//! Training-state checkpointing.
//!
//! A checkpoint is a directory holding everything needed to resume a run
//! bit-for-bit:
//!
//! ```text
//! <checkpoint_dir>/checkpoint_00001000/
//!     params.bin          live networks       (BinFileRecorder, full precision)
//!     target_params.bin   target networks
//!     optimizer.bin       optimizer moments keyed by parameter id
//!     state.json          step, target_update, learning_rate, max_grad_norm, rng
//! ```

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::rng::PrngKey;
use crate::core::target_network::TargetUpdate;
use crate::core::training_state::{OptimizerSettings, TrainingState};

const PREFIX: &str = "checkpoint_";
const PARAMS_FILE: &str = "params.bin";
const TARGET_PARAMS_FILE: &str = "target_params.bin";
const OPTIMIZER_FILE: &str = "optimizer.bin";
const STATE_FILE: &str = "state.json";

type StateRecorder = BinFileRecorder<FullPrecisionSettings>;

/// Configuration for the checkpointer.
#[derive(Debug, Clone)]
pub struct CheckpointerConfig {
    /// Directory to store checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Updates between checkpoint saves (0 = never).
    pub save_interval: usize,
    /// Number of recent checkpoints to keep (0 = keep all).
    pub keep_last_n: usize,
}

impl Default for CheckpointerConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("logdir/checkpoints"),
            save_interval: 1000,
            keep_last_n: 5,
        }
    }
}

impl CheckpointerConfig {
    /// Create a new config with specified checkpoint directory.
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_save_interval(mut self, interval: usize) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn with_keep_last_n(mut self, n: usize) -> Self {
        self.keep_last_n = n;
        self
    }
}

/// Error type for checkpointing operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    /// `state.json` is missing fields or holds invalid values.
    Metadata(String),
    /// No checkpoints found.
    NoCheckpoints,
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::Metadata(e) => write!(f, "Invalid checkpoint metadata: {}", e),
            CheckpointError::NoCheckpoints => write!(f, "No checkpoints found"),
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(e: serde_json::Error) -> Self {
        CheckpointError::Metadata(e.to_string())
    }
}

fn recorder_error(e: impl std::fmt::Display) -> CheckpointError {
    CheckpointError::Recorder(e.to_string())
}

/// Checkpoint metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    /// Path to the checkpoint directory.
    pub path: PathBuf,
    /// Update step at which the checkpoint was saved.
    pub step: usize,
}

/// Scalar part of a training state, stored as `state.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateMeta {
    step: usize,
    target_update: TargetUpdate,
    learning_rate: f64,
    max_grad_norm: Option<f32>,
    rng: PrngKey,
}

impl StateMeta {
    fn settings(&self) -> OptimizerSettings {
        OptimizerSettings {
            learning_rate: self.learning_rate,
            max_grad_norm: self.max_grad_norm,
        }
    }
}

fn parse_step(name: &str) -> Option<usize> {
    name.strip_prefix(PREFIX)?.parse().ok()
}

/// Training-state checkpointer.
///
/// Saves full snapshots at regular intervals and removes the oldest ones
/// beyond `keep_last_n`.
pub struct Checkpointer {
    config: CheckpointerConfig,
}

impl Checkpointer {
    /// Create a new checkpointer.
    ///
    /// Creates the checkpoint directory if it doesn't exist.
    pub fn new(config: CheckpointerConfig) -> Result<Self, CheckpointError> {
        fs::create_dir_all(&config.checkpoint_dir)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CheckpointerConfig {
        &self.config
    }

    /// Check if it's time to save a checkpoint.
    pub fn should_save(&self, step: usize) -> bool {
        self.config.save_interval > 0 && step > 0 && step % self.config.save_interval == 0
    }

    /// Save a training state snapshot and return its directory.
    pub fn save<B, M, O>(&self, state: &TrainingState<B, M, O>) -> Result<PathBuf, CheckpointError>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let dir = self
            .config
            .checkpoint_dir
            .join(format!("{}{:08}", PREFIX, state.step()));
        fs::create_dir_all(&dir)?;

        let recorder = StateRecorder::new();
        state
            .params()
            .clone()
            .save_file(dir.join(PARAMS_FILE), &recorder)
            .map_err(recorder_error)?;
        state
            .target_params()
            .clone()
            .save_file(dir.join(TARGET_PARAMS_FILE), &recorder)
            .map_err(recorder_error)?;
        <StateRecorder as Recorder<B>>::record(
            &recorder,
            state.optimizer().to_record(),
            dir.join(OPTIMIZER_FILE),
        )
        .map_err(recorder_error)?;

        let meta = StateMeta {
            step: state.step(),
            target_update: state.target_update(),
            learning_rate: state.learning_rate(),
            max_grad_norm: state.max_grad_norm(),
            rng: state.rng().clone(),
        };
        let file = fs::File::create(dir.join(STATE_FILE))?;
        serde_json::to_writer_pretty(file, &meta)?;

        log::info!("Saved checkpoint at step {} to {:?}", state.step(), dir);
        self.cleanup_old_checkpoints()?;

        Ok(dir)
    }

    /// Restore a training state from a checkpoint directory.
    ///
    /// `template` and `optimizer` only provide the structure; every value is
    /// overwritten by the stored records.
    pub fn load<B, M, O>(
        &self,
        path: &Path,
        template: M,
        optimizer: O,
        device: &B::Device,
    ) -> Result<TrainingState<B, M, O>, CheckpointError>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let meta: StateMeta = serde_json::from_reader(fs::File::open(path.join(STATE_FILE))?)?;
        let settings = meta.settings();
        settings
            .validate()
            .map_err(|e| CheckpointError::Metadata(e.to_string()))?;
        meta.target_update
            .validate()
            .map_err(|e| CheckpointError::Metadata(e.to_string()))?;

        let recorder = StateRecorder::new();
        let params = template
            .clone()
            .load_file(path.join(PARAMS_FILE), &recorder, device)
            .map_err(recorder_error)?;
        let target_params = template
            .load_file(path.join(TARGET_PARAMS_FILE), &recorder, device)
            .map_err(recorder_error)?;
        let record = <StateRecorder as Recorder<B>>::load(&recorder, path.join(OPTIMIZER_FILE), device)
            .map_err(recorder_error)?;
        let optimizer = optimizer.load_record(record);

        log::info!("Restored checkpoint at step {} from {:?}", meta.step, path);

        Ok(TrainingState::from_parts(
            params,
            target_params,
            optimizer,
            meta.rng,
            settings,
            meta.target_update,
            meta.step,
        ))
    }

    /// Restore the most recent checkpoint.
    pub fn load_latest<B, M, O>(
        &self,
        template: M,
        optimizer: O,
        device: &B::Device,
    ) -> Result<TrainingState<B, M, O>, CheckpointError>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let latest = self.find_latest_checkpoint()?;
        self.load(&latest.path, template, optimizer, device)
    }

    /// Find the latest checkpoint in the checkpoint directory.
    pub fn find_latest_checkpoint(&self) -> Result<CheckpointInfo, CheckpointError> {
        self.list_checkpoints()?
            .pop()
            .ok_or(CheckpointError::NoCheckpoints)
    }

    /// List all complete checkpoints, oldest first.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let mut checkpoints: Vec<CheckpointInfo> = fs::read_dir(&self.config.checkpoint_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                let step = parse_step(path.file_name()?.to_str()?)?;
                // Interrupted saves have no state.json yet.
                path.join(STATE_FILE)
                    .is_file()
                    .then_some(CheckpointInfo { path, step })
            })
            .collect();

        checkpoints.sort_by_key(|c| c.step);
        Ok(checkpoints)
    }

    /// Remove the oldest checkpoints, keeping only the last N.
    fn cleanup_old_checkpoints(&self) -> Result<(), CheckpointError> {
        if self.config.keep_last_n == 0 {
            return Ok(());
        }

        let checkpoints = self.list_checkpoints()?;
        let excess = checkpoints.len().saturating_sub(self.config.keep_last_n);
        for old in &checkpoints[..excess] {
            log::debug!("Removing old checkpoint {:?}", old.path);
            fs::remove_dir_all(&old.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{Drq, DrqConfig};
    use crate::testing::{device, flat_params, toy_batch, toy_state, ToyNetworks, ToyState};
    use burn::optim::AdamWConfig;
    use tempfile::tempdir;

    fn drq() -> Drq {
        Drq::new(
            DrqConfig::new()
                .with_batch_size(4)
                .with_entropy_coef(0.1)
                .with_shift(2)
                .with_ensemble(3, 2),
        )
        .unwrap()
    }

    fn trained(steps: usize) -> ToyState {
        let drq = drq();
        let batch = toy_batch(4, 1.0, 0.99);
        let mut state = toy_state(11, 3, TargetUpdate::Exponential(0.05));
        for _ in 0..steps {
            state = drq.step(state, &batch).unwrap().0;
        }
        state
    }

    fn restore(checkpointer: &Checkpointer, path: &Path) -> ToyState {
        let device = device();
        checkpointer
            .load(
                path,
                ToyNetworks::new(3, &device),
                AdamWConfig::new().with_weight_decay(1e-6).init(),
                &device,
            )
            .unwrap()
    }

    #[test]
    fn test_checkpointer_config() {
        let config = CheckpointerConfig::new("./test_ckpts")
            .with_save_interval(5000)
            .with_keep_last_n(3);

        assert_eq!(config.checkpoint_dir, PathBuf::from("./test_ckpts"));
        assert_eq!(config.save_interval, 5000);
        assert_eq!(config.keep_last_n, 3);
    }

    #[test]
    fn test_should_save() {
        let dir = tempdir().unwrap();
        let config = CheckpointerConfig::new(dir.path()).with_save_interval(100);
        let checkpointer = Checkpointer::new(config).unwrap();

        assert!(!checkpointer.should_save(0));
        assert!(!checkpointer.should_save(50));
        assert!(checkpointer.should_save(100));
        assert!(!checkpointer.should_save(150));
        assert!(checkpointer.should_save(200));

        let never = Checkpointer::new(CheckpointerConfig::new(dir.path()).with_save_interval(0)).unwrap();
        assert!(!never.should_save(100));
    }

    #[test]
    fn test_checkpoint_dir_creation() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("nested/checkpoints");

        let _checkpointer = Checkpointer::new(CheckpointerConfig::new(&subdir)).unwrap();

        assert!(subdir.exists());
    }

    #[test]
    fn test_save_layout() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();
        let state = trained(2);

        let path = checkpointer.save(&state).unwrap();

        assert_eq!(path, dir.path().join("checkpoint_00000002"));
        for file in [PARAMS_FILE, TARGET_PARAMS_FILE, OPTIMIZER_FILE, STATE_FILE] {
            assert!(path.join(file).is_file(), "missing {}", file);
        }

        let meta: serde_json::Value =
            serde_json::from_reader(fs::File::open(path.join(STATE_FILE)).unwrap()).unwrap();
        assert_eq!(meta["step"], 2);
        assert!((meta["target_update"].as_f64().unwrap() - 0.05).abs() < 1e-6);
        assert!(meta["rng"].is_object());
    }

    #[test]
    fn test_round_trip_resumes_identically() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();
        let original = trained(2);

        let path = checkpointer.save(&original).unwrap();
        let restored = restore(&checkpointer, &path);

        assert_eq!(restored.step(), original.step());
        assert_eq!(restored.rng(), original.rng());
        assert_eq!(restored.target_update(), original.target_update());
        assert_eq!(restored.settings(), original.settings());
        assert_eq!(flat_params(restored.params()), flat_params(original.params()));
        assert_eq!(
            flat_params(restored.target_params()),
            flat_params(original.target_params())
        );

        let drq = drq();
        let batch = toy_batch(4, 1.0, 0.99);
        let (original, metrics_a) = drq.step(original, &batch).unwrap();
        let (restored, metrics_b) = drq.step(restored, &batch).unwrap();

        assert_eq!(metrics_a, metrics_b);
        assert_eq!(flat_params(original.params()), flat_params(restored.params()));
        assert_eq!(
            flat_params(original.target_params()),
            flat_params(restored.target_params())
        );
        assert_eq!(original.rng(), restored.rng());
    }

    #[test]
    fn test_list_and_latest() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();

        assert!(matches!(
            checkpointer.find_latest_checkpoint(),
            Err(CheckpointError::NoCheckpoints)
        ));

        checkpointer.save(&trained(1)).unwrap();
        checkpointer.save(&trained(3)).unwrap();
        // Incomplete directory is ignored.
        fs::create_dir_all(dir.path().join("checkpoint_00000009")).unwrap();

        let steps: Vec<usize> = checkpointer
            .list_checkpoints()
            .unwrap()
            .iter()
            .map(|c| c.step)
            .collect();
        assert_eq!(steps, vec![1, 3]);
        assert_eq!(checkpointer.find_latest_checkpoint().unwrap().step, 3);

        let device = device();
        let latest: ToyState = checkpointer
            .load_latest(
                ToyNetworks::new(3, &device),
                AdamWConfig::new().with_weight_decay(1e-6).init(),
                &device,
            )
            .unwrap();
        assert_eq!(latest.step(), 3);
    }

    #[test]
    fn test_keeps_last_n() {
        let dir = tempdir().unwrap();
        let checkpointer =
            Checkpointer::new(CheckpointerConfig::new(dir.path()).with_keep_last_n(2)).unwrap();

        let drq = drq();
        let batch = toy_batch(4, 1.0, 0.99);
        let mut state = toy_state(2, 3, TargetUpdate::Periodic(2));
        for _ in 0..4 {
            state = drq.step(state, &batch).unwrap().0;
            checkpointer.save(&state).unwrap();
        }

        let steps: Vec<usize> = checkpointer
            .list_checkpoints()
            .unwrap()
            .iter()
            .map(|c| c.step)
            .collect();
        assert_eq!(steps, vec![3, 4]);
        assert!(!dir.path().join("checkpoint_00000001").exists());
    }

    #[test]
    fn test_corrupt_metadata_rejected() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();
        let path = checkpointer.save(&trained(1)).unwrap();
        fs::write(path.join(STATE_FILE), "{\"step\": 1}").unwrap();

        let device = device();
        let result: Result<ToyState, _> = checkpointer.load(
            &path,
            ToyNetworks::new(3, &device),
            AdamWConfig::new().with_weight_decay(1e-6).init(),
            &device,
        );
        assert!(matches!(result, Err(CheckpointError::Metadata(_))));
    }
}
