//! DrQ update step.
//!
//! One call turns a batch of transitions into a parameter update:
//!
//! ```text
//! rng ──split──> augment_obs, augment_next_obs, action, ensemble, carry
//!
//! s   = encode(live,   shift(o))
//! s'  = encode(target, shift(o'))                        (no gradient)
//! π   = policy(live, s');  H = entropy(π);  a' = μ + σ·ε
//! v   = min_{k ∈ subset} critic(target, s', a')_k + α·H  (no gradient)
//! y   = r + γ·d·v                                         (no gradient)
//! L_c = reduce_members (critic(live, s, a) − y)²
//! L_a = −(mean_members critic(live*, s', a') + α·H)       live* = frozen copy
//! ∇   = grad(mean_batch(L_c + L_a))  w.r.t. live params
//! ```
//!
//! Every row of the batch is computed independently (own shift, own action
//! noise, own critic subset), so the gradient of the batch mean equals the
//! mean of the per-sample gradients.

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use rand::seq::index;

use super::config::{CriticReduction, DrqConfig};
use crate::algorithms::augmentation::{Augmentation, RandomShift};
use crate::algorithms::networks::DrqNetworks;
use crate::core::gradients::global_norm;
use crate::core::rng::{standard_normal, PrngKey};
use crate::core::training_state::TrainingState;
use crate::core::transition::TransitionBatch;
use crate::error::{ConfigError, DrqError, ShapeError};
use crate::metrics::DrqMetrics;

// ============================================================================
// Randomness streams
// ============================================================================

/// Independent keys consumed by one update step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepStreams {
    pub augment_obs: PrngKey,
    pub augment_next_obs: PrngKey,
    pub action: PrngKey,
    pub ensemble: PrngKey,
    /// Fresh cursor stored in the next training state.
    pub carry: PrngKey,
}

impl StepStreams {
    pub fn split(key: PrngKey) -> Self {
        let [augment_obs, augment_next_obs, action, ensemble, carry] = key.split_array();
        Self {
            augment_obs,
            augment_next_obs,
            action,
            ensemble,
            carry,
        }
    }
}

// ============================================================================
// Loss helpers
// ============================================================================

/// Per-sample draw of `num_critics` distinct member indices out of
/// `0..ensemble_size`.
pub fn sample_critic_indices(
    key: PrngKey,
    batch_size: usize,
    ensemble_size: usize,
    num_critics: usize,
) -> Result<Vec<Vec<usize>>, ShapeError> {
    if num_critics > ensemble_size {
        return Err(ShapeError::EnsembleSubsample {
            requested: num_critics,
            ensemble_size,
        });
    }

    Ok(key
        .split(batch_size)
        .into_iter()
        .map(|sample_key| {
            let mut rng = sample_key.into_rng();
            index::sample(&mut rng, ensemble_size, num_critics).into_vec()
        })
        .collect())
}

/// Minimum of `q` `[batch, ensemble]` over each row's index subset.
pub fn subset_min<B: Backend>(q: Tensor<B, 2>, indices: &[Vec<usize>]) -> Tensor<B, 1> {
    let [batch_size, _] = q.dims();
    let k = indices.first().map_or(0, Vec::len);
    let flat: Vec<i32> = indices.iter().flatten().map(|&i| i as i32).collect();
    let idx = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &q.device()).reshape([batch_size, k]);

    q.gather(1, idx).min_dim(1).reshape([batch_size])
}

/// Soft bootstrap target `r + γ·d·v`.
pub fn bootstrap_target<B: Backend>(
    rewards: Tensor<B, 1>,
    discounts: Tensor<B, 1>,
    value: Tensor<B, 1>,
    gamma: f32,
) -> Tensor<B, 1> {
    rewards + discounts.mul_scalar(gamma) * value
}

/// Squared error of every member against the shared target, reduced per
/// sample. Returns `[batch]`.
pub fn critic_loss<B: Backend>(
    q: Tensor<B, 2>,
    target: Tensor<B, 1>,
    reduction: CriticReduction,
) -> Tensor<B, 1> {
    let [batch_size, _] = q.dims();
    let squared = (q - target.unsqueeze_dim(1)).powf_scalar(2.0);
    let reduced = match reduction {
        CriticReduction::Sum => squared.sum_dim(1),
        CriticReduction::Mean => squared.mean_dim(1),
    };
    reduced.reshape([batch_size])
}

/// Maximum-entropy actor loss `−(q + α·H)`. Returns `[batch]`.
pub fn actor_loss<B: Backend>(
    q_mean: Tensor<B, 1>,
    entropy: Tensor<B, 1>,
    entropy_coef: f32,
) -> Tensor<B, 1> {
    (q_mean + entropy.mul_scalar(entropy_coef)).neg()
}

fn batch_mean<B: Backend>(values: Tensor<B, 1>) -> f32 {
    values.mean().into_scalar().elem::<f32>()
}

// ============================================================================
// DrQ
// ============================================================================

/// DrQ control-phase optimizer.
#[derive(Debug, Clone)]
pub struct Drq {
    config: DrqConfig,
    augmentation: RandomShift,
}

impl Drq {
    pub fn new(config: DrqConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let augmentation = RandomShift::new(config.shift);
        Ok(Self {
            config,
            augmentation,
        })
    }

    pub fn config(&self) -> &DrqConfig {
        &self.config
    }

    fn check_batch<B, M>(&self, networks: &M, batch: &TransitionBatch<B>) -> Result<(), ShapeError>
    where
        B: AutodiffBackend,
        M: DrqNetworks<B>,
    {
        batch.validate(self.config.batch_size)?;

        let ensemble_size = networks.ensemble_size();
        if self.config.num_critics > ensemble_size {
            return Err(ShapeError::EnsembleSubsample {
                requested: self.config.num_critics,
                ensemble_size,
            });
        }

        let expected = networks.action_dim();
        if batch.action_dim() != expected {
            return Err(ShapeError::ActionDim {
                expected,
                actual: batch.action_dim(),
            });
        }
        Ok(())
    }

    /// Run one update and return the next state with its metrics.
    ///
    /// Shape problems are reported before any computation. Non-finite
    /// values are not masked; they show up in the returned metrics.
    pub fn step<B, M, O>(
        &self,
        state: TrainingState<B, M, O>,
        batch: &TransitionBatch<B>,
    ) -> Result<(TrainingState<B, M, O>, DrqMetrics), DrqError>
    where
        B: AutodiffBackend,
        M: DrqNetworks<B> + AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let live = state.params();
        let target = state.target_params();
        self.check_batch(live, batch)?;

        let streams = StepStreams::split(state.rng().clone());
        let cfg = &self.config;
        let device = batch.rewards.device();
        let batch_size = batch.batch_size();
        let alpha = cfg.entropy_coef;

        // Augment images only; features pass through.
        let observations = batch.observations.clone().with_image(
            self.augmentation
                .augment(streams.augment_obs, batch.observations.image.clone()),
        );
        let next_observations = batch.next_observations.clone().with_image(
            self.augmentation
                .augment(streams.augment_next_obs, batch.next_observations.image.clone()),
        );

        let state_emb = live.encode(&observations);
        let next_state_emb = target.encode(&next_observations).detach();

        let policy = live.policy(next_state_emb.clone());
        let entropy = policy.entropy();
        let noise = standard_normal::<B>(streams.action, batch_size, policy.action_dim(), &device);
        let next_action = policy.rsample(noise);

        // Bootstrap target from a random subset of target critics.
        let indices = sample_critic_indices(
            streams.ensemble,
            batch_size,
            live.ensemble_size(),
            cfg.num_critics,
        )?;
        let next_q = target
            .critic(next_state_emb.clone(), next_action.clone().detach())
            .detach();
        let min_next_q = subset_min(next_q, &indices);
        let value = min_next_q + entropy.clone().detach().mul_scalar(alpha);
        let y = bootstrap_target(
            batch.rewards.clone(),
            batch.discounts.clone(),
            value.clone(),
            cfg.gamma,
        )
        .detach();

        let q = live.critic(state_emb, batch.actions.clone());
        let critic_losses = critic_loss(q, y, cfg.critic_reduction);

        // Critic parameters frozen for the actor term.
        let frozen = live.clone().no_grad();
        let actor_q = frozen
            .critic(next_state_emb, next_action)
            .mean_dim(1)
            .reshape([batch_size]);
        let actor_losses = actor_loss(actor_q, entropy.clone(), alpha);

        let joint = critic_losses.clone() + actor_losses.clone();
        let grads = GradientsParams::from_grads(joint.mean().backward(), live);
        let grad_norm = global_norm::<B, M>(live, &grads);

        let metrics = DrqMetrics {
            critic_loss: batch_mean(critic_losses),
            actor_loss: batch_mean(actor_losses),
            entropy: batch_mean(entropy),
            reward: batch_mean(batch.rewards.clone()),
            value: batch_mean(value),
            grad_norm,
        };

        let state = state.apply(grads).with_rng(streams.carry);
        log::debug!(
            "DrQ step {}: critic {:.4}, actor {:.4}, entropy {:.4}, grad_norm {:.4}",
            state.step(),
            metrics.critic_loss,
            metrics.actor_loss,
            metrics.entropy,
            metrics.grad_norm
        );

        Ok((state, metrics))
    }
}
