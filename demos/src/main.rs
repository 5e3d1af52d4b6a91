//! visual_rl demos
//!
//! Trains the reference networks on synthetic replay data, end to end:
//! configuration, DrQ updates, console/CSV metrics and checkpoints.
//!
//! ```bash
//! # Fresh run with the built-in demo configuration
//! RUST_LOG=info cargo run --release -p demos -- train
//!
//! # Fresh run from a JSON configuration
//! cargo run --release -p demos -- train config.json
//!
//! # Continue from the latest checkpoint in the configured logdir
//! cargo run --release -p demos -- resume [config.json]
//! ```

mod synthetic;

use burn::backend::{Autodiff, NdArray};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::AdamW;

use visual_rl::error::Result;
use visual_rl::{
    Checkpointer, CoderConfig, CoderNetworks, ConsoleLogger, CsvLogger, Drq, MultiLogger, PrngKey,
    Trainer, TrainingState,
};

use synthetic::SyntheticReplay;

// ============================================================================
// Backend Type
// ============================================================================

type B = Autodiff<NdArray<f32>>;
type Networks = CoderNetworks<B>;
type State = TrainingState<B, Networks, OptimizerAdaptor<AdamW, Networks, B>>;

const IMAGE_SHAPE: [usize; 3] = [3, 32, 32];
const ACTION_DIM: usize = 2;
const ITERATIONS: usize = 20;

/// Small configuration that trains in seconds on CPU.
fn demo_config() -> CoderConfig {
    CoderConfig {
        replay_capacity: 1000,
        ..CoderConfig::default()
    }
    .with_logdir("logdir/demo")
    .with_drq_batch_size(16)
    .with_utd(2)
    .with_log_every(4)
    .with_ensemble(4, 2)
    .with_cnn(32, vec![16, 16, 16], vec![3, 3, 3], vec![2, 2, 2])
    .with_actor_layers(vec![64])
    .with_critic_layers(vec![64, 64])
    .with_checkpointing(10, 3)
}

fn train(config_path: Option<&str>, resume: bool) -> Result<()> {
    let config = match config_path {
        Some(path) => CoderConfig::from_json_file(path)?,
        None => demo_config(),
    };
    config.validate()?;

    println!("=== DrQ (synthetic replay) ===");
    println!("Task: {}, seed: {}", config.task, config.seed);
    println!(
        "Batch: {}, UTD: {}, ensemble: {} (min over {})",
        config.drq_batch_size, config.utd, config.ensemble_size, config.num_critics
    );
    println!("Target update: {}", config.target_update());
    println!("Logdir: {:?}", config.logdir);
    println!();

    let device = Default::default();
    let networks: Networks = config
        .networks_config(IMAGE_SHAPE, 0, ACTION_DIM)
        .init(&device)?;
    config.save_json(config.logdir.join("config.json"))?;

    let checkpointer = Checkpointer::new(config.checkpointer_config())?;
    let state: State = if resume {
        checkpointer.load_latest(networks, config.optimizer_config().init(), &device)?
    } else {
        TrainingState::init(
            PrngKey::new(config.seed),
            networks,
            config.optimizer_config().init(),
            config.optimizer_settings(),
            config.target_update(),
        )?
    };
    log::info!("Starting at step {}", state.step());

    let mut logger = MultiLogger::new().add(ConsoleLogger::new(config.log_every));
    match CsvLogger::new(config.logdir.join("metrics.csv")) {
        Ok(csv) => logger = logger.add(csv),
        Err(e) => log::warn!("CSV metrics disabled: {}", e),
    }

    let mut replay = SyntheticReplay::<B>::generate(
        config.replay_capacity,
        IMAGE_SHAPE,
        ACTION_DIM,
        config.seed,
        &device,
    );

    let mut trainer = Trainer::new(Drq::new(config.drq_config())?, config.trainer_config())?
        .with_logger(logger)
        .with_checkpointer(checkpointer);
    let state = trainer.run(state, &mut replay, ITERATIONS)?;

    println!();
    println!("=== Training Complete ===");
    println!("Updates: {}", state.step());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(2).map(String::as_str);

    let result = match args.get(1).map(String::as_str) {
        Some("train") => train(config_path, false),
        Some("resume") => train(config_path, true),
        Some(other) => {
            println!("Unknown command: {}", other);
            println!();
            print_usage();
            return;
        }
        None => {
            print_usage();
            return;
        }
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Usage: cargo run --release -p demos -- <command> [config.json]");
    println!();
    println!("  train     Fresh run on synthetic replay data");
    println!("  resume    Continue from the latest checkpoint in the logdir");
}
