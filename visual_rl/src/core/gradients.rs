//! Global gradient norm and clip-by-global-norm.
//!
//! burn's optimizer-level clipping (`GradientClippingConfig::Norm`) clips
//! each parameter tensor on its own. The update step needs the norm over
//! the whole parameter set, both to report it and to clip with it, so the
//! gradients are walked here with a `ModuleVisitor`.
//!
//! ```text
//! ‖g‖ = sqrt(Σ_p Σ_i g_{p,i}²)
//! g  ← g · max_norm / ‖g‖     when ‖g‖ > max_norm
//! ```

use burn::module::{AutodiffModule, ModuleVisitor, Param};
use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;

struct SquaredNorm<'a> {
    grads: &'a GradientsParams,
    total: f64,
}

impl<'a, B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'a> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(param.id.clone()) {
            let sq: f32 = grad.powf_scalar(2.0).sum().into_scalar().elem();
            self.total += sq as f64;
        }
    }
}

struct Rescale<'a> {
    grads: &'a mut GradientsParams,
    scale: f32,
}

impl<'a, B: AutodiffBackend> ModuleVisitor<B> for Rescale<'a> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        let id = param.id.clone();
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id.clone()) {
            self.grads.register(id, grad.mul_scalar(self.scale));
        }
    }
}

/// Global L2 norm of the gradients of `module`'s parameters.
pub fn global_norm<B, M>(module: &M, grads: &GradientsParams) -> f32
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm { grads, total: 0.0 };
    module.visit(&mut visitor);
    visitor.total.sqrt() as f32
}

/// Rescale all gradients so their global norm is at most `max_norm`.
///
/// Returns the norm measured before clipping. Non-finite norms leave the
/// gradients untouched so the failure stays visible downstream.
pub fn clip_by_global_norm<B, M>(module: &M, grads: &mut GradientsParams, max_norm: f32) -> f32
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_norm::<B, M>(module, grads);
    if norm.is_finite() && norm > max_norm {
        let mut visitor = Rescale {
            grads,
            scale: max_norm / norm,
        };
        module.visit(&mut visitor);
    }
    norm
}
