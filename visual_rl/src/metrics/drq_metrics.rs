//! Per-update metrics record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Batch-mean metrics of one DrQ update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DrqMetrics {
    pub critic_loss: f32,
    pub actor_loss: f32,
    /// Entropy of the policy at the next state.
    pub entropy: f32,
    pub reward: f32,
    /// Bootstrap value `min_q' + α·H`.
    pub value: f32,
    /// Global norm of the mean gradient, before clipping.
    pub grad_norm: f32,
}

impl DrqMetrics {
    pub const NAMES: [&'static str; 6] = [
        "critic_loss",
        "actor_loss",
        "entropy",
        "reward",
        "value",
        "grad_norm",
    ];

    fn values(&self) -> [f32; 6] {
        [
            self.critic_loss,
            self.actor_loss,
            self.entropy,
            self.reward,
            self.value,
            self.grad_norm,
        ]
    }

    /// Metrics as a name → scalar map.
    pub fn to_map(&self) -> BTreeMap<&'static str, f32> {
        Self::NAMES.into_iter().zip(self.values()).collect()
    }

    /// First metric that is NaN or infinite, if any.
    pub fn first_non_finite(&self) -> Option<(&'static str, f32)> {
        Self::NAMES
            .into_iter()
            .zip(self.values())
            .find(|(_, value)| !value.is_finite())
    }

    pub fn is_finite(&self) -> bool {
        self.first_non_finite().is_none()
    }

    /// Elementwise mean over several records. `None` for an empty input.
    pub fn mean<'a>(records: impl IntoIterator<Item = &'a DrqMetrics>) -> Option<DrqMetrics> {
        let mut sum = DrqMetrics::default();
        let mut count = 0usize;
        for m in records {
            sum.critic_loss += m.critic_loss;
            sum.actor_loss += m.actor_loss;
            sum.entropy += m.entropy;
            sum.reward += m.reward;
            sum.value += m.value;
            sum.grad_norm += m.grad_norm;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f32;
        Some(DrqMetrics {
            critic_loss: sum.critic_loss / n,
            actor_loss: sum.actor_loss / n,
            entropy: sum.entropy / n,
            reward: sum.reward / n,
            value: sum.value / n,
            grad_norm: sum.grad_norm / n,
        })
    }
}
