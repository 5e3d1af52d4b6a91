//! Target parameter tracking.
//!
//! The target copy of the networks lags the live copy and provides stable
//! bootstrap values. Two disciplines are supported, selected once when the
//! training state is created:
//!
//! ```text
//! Periodic(N):     θ_target ← θ_live            when step % N == 0
//! Exponential(ρ):  θ_target ← ρ·θ_live + (1−ρ)·θ_target   every step
//! ```
//!
//! At the configuration boundary the variant is chosen by the JSON number
//! type: an integer selects periodic copies, a float selects exponential
//! smoothing.
//!
//! # Usage
//!
//! ```ignore
//! use visual_rl::core::target_network::TargetUpdate;
//!
//! let update = TargetUpdate::Exponential(0.01);
//! update.validate()?;
//! let target = update.sync(&live, target, step);
//! ```

use burn::module::{Module, ModuleMapper, Param};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Tracking discipline
// ============================================================================

/// How the target parameters follow the live parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetUpdate {
    /// Exact copy every `N` applied updates.
    Periodic(usize),
    /// Exponential smoothing with rate `ρ ∈ (0, 1]` on every applied update.
    Exponential(f32),
}

impl TargetUpdate {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            TargetUpdate::Periodic(0) => Err(ConfigError::InvalidTargetUpdate(
                "periodic interval must be >= 1".to_string(),
            )),
            TargetUpdate::Periodic(_) => Ok(()),
            TargetUpdate::Exponential(rho) if !rho.is_finite() || rho <= 0.0 || rho > 1.0 => {
                Err(ConfigError::InvalidTargetUpdate(format!(
                    "exponential rate must be in (0, 1], got {}",
                    rho
                )))
            }
            TargetUpdate::Exponential(_) => Ok(()),
        }
    }

    /// Produce the new target after the live parameters reached `step`.
    ///
    /// `step` is the post-increment update count, so a periodic interval of
    /// `N` copies on steps `N, 2N, ...`.
    pub fn sync<B, M>(&self, live: &M, target: M, step: usize) -> M
    where
        B: Backend,
        M: Module<B>,
    {
        match *self {
            TargetUpdate::Periodic(interval) => {
                if interval > 0 && step % interval == 0 {
                    hard_copy(live)
                } else {
                    target
                }
            }
            TargetUpdate::Exponential(rho) => soft_update(live, target, rho),
        }
    }
}

impl std::fmt::Display for TargetUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetUpdate::Periodic(n) => write!(f, "periodic(every {})", n),
            TargetUpdate::Exponential(rho) => write!(f, "exponential(rho={})", rho),
        }
    }
}

// ============================================================================
// Soft update via ModuleMapper
// ============================================================================

/// Collects live parameters, flattened and detached, in traversal order.
struct LiveParams<B: Backend> {
    flat: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for LiveParams<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val().detach();
        let numel: usize = val.dims().iter().product();
        self.flat.push(val.reshape([numel]));
        param
    }
}

/// Interpolates each target parameter towards the matching live one.
///
/// Parameters are matched by traversal order, which is identical for two
/// modules of the same structure.
struct Interpolate<B: Backend> {
    live: Vec<Tensor<B, 1>>,
    rho: f32,
    index: usize,
    unmatched: usize,
}

impl<B: Backend> ModuleMapper<B> for Interpolate<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let Some(live) = self.live.get(self.index).cloned() else {
            self.unmatched += 1;
            return param;
        };
        self.index += 1;

        let target = param.val();
        let shape = target.dims();
        let require_grad = target.is_require_grad();
        let numel: usize = shape.iter().product();

        // Detached so the target never accumulates an autodiff history, and
        // so the result is a leaf that can be tracked again.
        let mixed = live.mul_scalar(self.rho)
            + target.detach().reshape([numel]).mul_scalar(1.0 - self.rho);
        let mixed = mixed
            .reshape(shape)
            .detach()
            .set_require_grad(require_grad);

        Param::initialized(param.id.clone(), mixed)
    }
}

/// Exponential smoothing: `θ_target = ρ·θ_live + (1−ρ)·θ_target`.
///
/// `ρ = 1` returns an exact copy of `live`.
pub fn soft_update<B, M>(live: &M, target: M, rho: f32) -> M
where
    B: Backend,
    M: Module<B>,
{
    if rho >= 1.0 {
        return hard_copy(live);
    }

    let mut collector = LiveParams { flat: Vec::new() };
    let _ = live.clone().map(&mut collector);

    let mut interpolate = Interpolate {
        live: collector.flat,
        rho,
        index: 0,
        unmatched: 0,
    };
    let target = target.map(&mut interpolate);

    if interpolate.unmatched > 0 || interpolate.index < interpolate.live.len() {
        log::warn!(
            "Soft update structure mismatch: {} live params, {} matched, {} target params left unchanged",
            interpolate.live.len(),
            interpolate.index,
            interpolate.unmatched
        );
    }
    target
}

/// Exact copy of the live parameters.
pub fn hard_copy<B, M>(live: &M) -> M
where
    B: Backend,
    M: Module<B>,
{
    live.clone()
}
