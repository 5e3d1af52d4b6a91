//! Network adapter consumed by the DrQ update.
//!
//! The update step only needs three pure functions of the parameters:
//!
//! ```text
//! encode(params, observation)     -> state      [batch, state_dim]
//! policy(params, state)           -> π          DiagGaussian over [batch, action_dim]
//! critic(params, state, action)   -> Q          [batch, ensemble_size]
//! ```
//!
//! Live and target parameters are two instances of the same module, so the
//! functions are methods on the module itself. [`crate::nn::CoderNetworks`]
//! is the reference implementation.

use burn::module::Module;
use burn::prelude::*;

use super::policy::DiagGaussian;
use crate::core::transition::Observation;

pub trait DrqNetworks<B: Backend>: Module<B> {
    /// Embed an observation into a state vector.
    fn encode(&self, observation: &Observation<B>) -> Tensor<B, 2>;

    /// Action distribution at `state`.
    fn policy(&self, state: Tensor<B, 2>) -> DiagGaussian<B>;

    /// One Q estimate per ensemble member.
    fn critic(&self, state: Tensor<B, 2>, action: Tensor<B, 2>) -> Tensor<B, 2>;

    fn ensemble_size(&self) -> usize;

    fn action_dim(&self) -> usize;
}
