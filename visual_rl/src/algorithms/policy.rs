//! Diagonal Gaussian policy distribution.
//!
//! The actor head outputs a mean and a log standard deviation per action
//! dimension. Sampling is reparameterized so that gradients reach the actor
//! through the sampled action:
//!
//! ```text
//! a = μ + σ ⊙ ε,    ε ~ N(0, I)
//! H = ½·D·(1 + ln 2π) + Σ log σ
//! ```
//!
//! The noise `ε` is supplied by the caller (see [`crate::core::rng::standard_normal`])
//! so the distribution itself never touches a random generator.

use burn::prelude::*;

pub const LOG_STD_MIN: f32 = -5.0;
pub const LOG_STD_MAX: f32 = 2.0;

/// Squash an unbounded log-std output into `[LOG_STD_MIN, LOG_STD_MAX]`.
///
/// ```text
/// log_std = LOG_STD_MIN + ½·(LOG_STD_MAX − LOG_STD_MIN)·(tanh(raw) + 1)
/// ```
pub fn clamp_log_std<B: Backend>(raw_log_std: Tensor<B, 2>) -> Tensor<B, 2> {
    let half_range = (LOG_STD_MAX - LOG_STD_MIN) / 2.0;
    raw_log_std
        .tanh()
        .mul_scalar(half_range)
        .add_scalar(LOG_STD_MIN + half_range)
}

/// Batched diagonal Gaussian over actions `[batch, action_dim]`.
#[derive(Debug, Clone)]
pub struct DiagGaussian<B: Backend> {
    pub mean: Tensor<B, 2>,
    pub log_std: Tensor<B, 2>,
}

impl<B: Backend> DiagGaussian<B> {
    pub fn new(mean: Tensor<B, 2>, log_std: Tensor<B, 2>) -> Self {
        Self { mean, log_std }
    }

    pub fn batch_size(&self) -> usize {
        self.mean.dims()[0]
    }

    pub fn action_dim(&self) -> usize {
        self.mean.dims()[1]
    }

    pub fn std(&self) -> Tensor<B, 2> {
        self.log_std.clone().exp()
    }

    /// Per-sample entropy `[batch]`.
    pub fn entropy(&self) -> Tensor<B, 1> {
        let [batch_size, action_dim] = self.log_std.dims();
        let log_2pi = (2.0 * std::f32::consts::PI).ln();
        let constant = 0.5 * action_dim as f32 * (1.0 + log_2pi);

        self.log_std
            .clone()
            .sum_dim(1)
            .reshape([batch_size])
            .add_scalar(constant)
    }

    /// Reparameterized sample `μ + σ ⊙ noise`.
    pub fn rsample(&self, noise: Tensor<B, 2>) -> Tensor<B, 2> {
        self.mean.clone() + self.std() * noise
    }

    /// Per-sample log density of `actions` `[batch]`.
    pub fn log_prob(&self, actions: Tensor<B, 2>) -> Tensor<B, 1> {
        let [batch_size, _] = actions.dims();
        let log_2pi = (2.0 * std::f32::consts::PI).ln();
        let z = (actions - self.mean.clone()) / self.std();

        (z.powf_scalar(2.0).mul_scalar(-0.5) - self.log_std.clone() - 0.5 * log_2pi)
            .sum_dim(1)
            .reshape([batch_size])
    }

    /// Deterministic action (the mean).
    pub fn mode(&self) -> Tensor<B, 2> {
        self.mean.clone()
    }
}
