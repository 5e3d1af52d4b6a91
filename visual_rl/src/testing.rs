//! Small deterministic networks and batches shared by the unit tests.

use burn::backend::{Autodiff, NdArray};
use burn::module::{Module, Param};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{AdamW, AdamWConfig};
use burn::prelude::*;

use crate::algorithms::networks::DrqNetworks;
use crate::algorithms::policy::{clamp_log_std, DiagGaussian};
use crate::core::rng::PrngKey;
use crate::core::target_network::TargetUpdate;
use crate::core::training_state::{OptimizerSettings, TrainingState};
use crate::core::transition::{Observation, TransitionBatch};

pub type TestBackend = Autodiff<NdArray<f32>>;
pub type ToyOptimizer = OptimizerAdaptor<AdamW, ToyNetworks<TestBackend>, TestBackend>;
pub type ToyState = TrainingState<TestBackend, ToyNetworks<TestBackend>, ToyOptimizer>;

pub const CHANNELS: usize = 3;
pub const HEIGHT: usize = 8;
pub const WIDTH: usize = 8;
pub const STATE_DIM: usize = 6;
pub const ACTION_DIM: usize = 2;
pub const HIDDEN: usize = 8;

pub fn device() -> <TestBackend as Backend>::Device {
    <TestBackend as Backend>::Device::default()
}

/// Fixed pseudo-random weights in `[-scale/2, scale/2)`.
fn formula<B: Backend>(rows: usize, cols: usize, scale: f32, salt: usize, device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = (0..rows * cols)
        .map(|k| {
            let (i, j) = (k / cols, k % cols);
            let u = ((i * 31 + j * 17 + salt * 7) % 23) as f32 / 23.0;
            (u - 0.5) * scale
        })
        .collect();
    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([rows, cols])
}

/// Linear encoder, linear Gaussian head, two-layer ensemble critic.
#[derive(Module, Debug)]
pub struct ToyNetworks<B: Backend> {
    encoder: Param<Tensor<B, 2>>,
    actor_mean: Param<Tensor<B, 2>>,
    actor_log_std: Param<Tensor<B, 2>>,
    critic_hidden: Param<Tensor<B, 2>>,
    critic_out: Param<Tensor<B, 2>>,
    #[module(skip)]
    ensemble_size: usize,
}

impl<B: Backend> ToyNetworks<B> {
    pub fn new(ensemble_size: usize, device: &B::Device) -> Self {
        let pixels = CHANNELS * HEIGHT * WIDTH;
        Self {
            encoder: Param::from_tensor(formula(pixels, STATE_DIM, 2.0 / (pixels as f32).sqrt(), 1, device)),
            actor_mean: Param::from_tensor(formula(STATE_DIM, ACTION_DIM, 1.0, 2, device)),
            actor_log_std: Param::from_tensor(formula(STATE_DIM, ACTION_DIM, 1.0, 3, device)),
            critic_hidden: Param::from_tensor(formula(STATE_DIM + ACTION_DIM, HIDDEN, 1.0, 4, device)),
            critic_out: Param::from_tensor(formula(HIDDEN, ensemble_size, 1.0, 5, device)),
            ensemble_size,
        }
    }
}

impl<B: Backend> DrqNetworks<B> for ToyNetworks<B> {
    fn encode(&self, observation: &Observation<B>) -> Tensor<B, 2> {
        let [batch_size, c, h, w] = observation.image.dims();
        let flat = observation.image.clone().reshape([batch_size, c * h * w]);
        flat.matmul(self.encoder.val()).tanh()
    }

    fn policy(&self, state: Tensor<B, 2>) -> DiagGaussian<B> {
        let mean = state.clone().matmul(self.actor_mean.val());
        let log_std = clamp_log_std(state.matmul(self.actor_log_std.val()));
        DiagGaussian::new(mean, log_std)
    }

    fn critic(&self, state: Tensor<B, 2>, action: Tensor<B, 2>) -> Tensor<B, 2> {
        let input = Tensor::cat(vec![state, action], 1);
        input
            .matmul(self.critic_hidden.val())
            .tanh()
            .matmul(self.critic_out.val())
    }

    fn ensemble_size(&self) -> usize {
        self.ensemble_size
    }

    fn action_dim(&self) -> usize {
        ACTION_DIM
    }
}

pub fn toy_state(seed: u64, ensemble_size: usize, target_update: TargetUpdate) -> ToyState {
    TrainingState::init(
        PrngKey::new(seed),
        ToyNetworks::new(ensemble_size, &device()),
        AdamWConfig::new().with_weight_decay(1e-6).init(),
        OptimizerSettings::new(1e-3).with_max_grad_norm(Some(50.0)),
        target_update,
    )
    .unwrap()
}

/// Deterministic batch with constant reward and discount.
pub fn toy_batch(batch_size: usize, reward: f32, discount: f32) -> TransitionBatch<TestBackend> {
    let device = device();
    let pixels = CHANNELS * HEIGHT * WIDTH;
    let image = |salt: usize| {
        let values: Vec<f32> = (0..batch_size * pixels)
            .map(|k| ((k * 7 + salt) % 13) as f32 / 13.0)
            .collect();
        Tensor::<TestBackend, 1>::from_floats(values.as_slice(), &device)
            .reshape([batch_size, CHANNELS, HEIGHT, WIDTH])
    };
    let actions: Vec<f32> = (0..batch_size * ACTION_DIM)
        .map(|k| (k % 5) as f32 / 5.0 - 0.4)
        .collect();

    TransitionBatch {
        observations: Observation::new(image(0)),
        actions: Tensor::<TestBackend, 1>::from_floats(actions.as_slice(), &device)
            .reshape([batch_size, ACTION_DIM]),
        rewards: Tensor::full([batch_size], reward, &device),
        discounts: Tensor::full([batch_size], discount, &device),
        next_observations: Observation::new(image(5)),
    }
}

/// All float parameters of a module, flattened in traversal order.
pub fn flat_params<B: Backend, M: Module<B>>(module: &M) -> Vec<f32> {
    struct Collect(Vec<f32>);

    impl<B: Backend> burn::module::ModuleVisitor<B> for Collect {
        fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
            self.0
                .extend(param.val().into_data().to_vec::<f32>().unwrap());
        }
    }

    let mut collect = Collect(Vec::new());
    module.visit(&mut collect);
    collect.0
}
