use std::collections::HashSet;

use burn::module::{Module, ParamId};
use burn::optim::GradientsParams;
use burn::prelude::*;

use super::*;
use crate::algorithms::networks::DrqNetworks;
use crate::config::CoderConfig;
use crate::core::rng::PrngKey;
use crate::core::target_network::TargetUpdate;
use crate::error::{DrqError, ShapeError};
use crate::metrics::DrqMetrics;
use crate::testing::{
    device, flat_params, toy_batch, toy_state, TestBackend, ToyNetworks, ToyState, ACTION_DIM,
};

type B = TestBackend;

fn drq(batch_size: usize) -> Drq {
    Drq::new(
        DrqConfig::new()
            .with_batch_size(batch_size)
            .with_gamma(0.98)
            .with_entropy_coef(0.1)
            .with_shift(2)
            .with_ensemble(3, 2),
    )
    .unwrap()
}

fn run(seed: u64, steps: usize) -> (ToyState, Vec<DrqMetrics>) {
    let drq = drq(4);
    let batch = toy_batch(4, 1.0, 0.99);
    let mut state = toy_state(seed, 3, TargetUpdate::Exponential(0.05));
    let mut metrics = Vec::new();
    for _ in 0..steps {
        let (next, m) = drq.step(state, &batch).unwrap();
        state = next;
        metrics.push(m);
    }
    (state, metrics)
}

// ============================================================================
// Loss helpers
// ============================================================================

#[test]
fn test_critic_loss_reductions() {
    let device = device();
    let q = Tensor::<B, 2>::from_floats([[1.0, 3.0], [0.0, 0.0]], &device);
    let y = Tensor::<B, 1>::from_floats([2.0, 1.0], &device);

    let sum = critic_loss(q.clone(), y.clone(), CriticReduction::Sum).into_data();
    assert_eq!(sum.as_slice::<f32>().unwrap(), &[2.0, 2.0]);

    let mean = critic_loss(q, y, CriticReduction::Mean).into_data();
    assert_eq!(mean.as_slice::<f32>().unwrap(), &[1.0, 1.0]);
}

#[test]
fn test_bootstrap_target_and_actor_loss() {
    let device = device();
    let r = Tensor::<B, 1>::from_floats([1.0, 0.0], &device);
    let d = Tensor::<B, 1>::from_floats([1.0, 0.0], &device);
    let v = Tensor::<B, 1>::from_floats([2.0, 5.0], &device);

    let y = bootstrap_target(r, d, v, 0.5).into_data();
    assert_eq!(y.as_slice::<f32>().unwrap(), &[2.0, 0.0]);

    let q = Tensor::<B, 1>::from_floats([1.0, -1.0], &device);
    let h = Tensor::<B, 1>::from_floats([2.0, 4.0], &device);
    let loss = actor_loss(q, h, 0.5).into_data();
    assert_eq!(loss.as_slice::<f32>().unwrap(), &[-2.0, -1.0]);
}

#[test]
fn test_subset_min_per_row() {
    let device = device();
    let q = Tensor::<B, 2>::from_floats([[5.0, 1.0, 3.0], [2.0, 8.0, 4.0]], &device);
    let indices = vec![vec![0, 2], vec![2, 1]];

    let min = subset_min(q, &indices).into_data();
    assert_eq!(min.as_slice::<f32>().unwrap(), &[3.0, 4.0]);
}

#[test]
fn test_ensemble_subsample_validity() {
    let indices = sample_critic_indices(PrngKey::new(4), 64, 5, 3).unwrap();
    assert_eq!(indices.len(), 64);
    for row in &indices {
        assert_eq!(row.len(), 3);
        assert!(row.iter().all(|&i| i < 5));
        let unique: HashSet<_> = row.iter().collect();
        assert_eq!(unique.len(), 3, "repeated member in {:?}", row);
    }
    // Rows get their own draws.
    assert!(indices.iter().any(|row| row != &indices[0]));

    let err = sample_critic_indices(PrngKey::new(4), 4, 2, 3).unwrap_err();
    assert_eq!(
        err,
        ShapeError::EnsembleSubsample {
            requested: 3,
            ensemble_size: 2
        }
    );
}

#[test]
fn test_step_streams_are_distinct() {
    let streams = StepStreams::split(PrngKey::new(9));
    let keys = [
        &streams.augment_obs,
        &streams.augment_next_obs,
        &streams.action,
        &streams.ensemble,
        &streams.carry,
    ];
    let unique: HashSet<_> = keys.iter().collect();
    assert_eq!(unique.len(), 5);
    assert_eq!(StepStreams::split(PrngKey::new(9)), streams);
}

// ============================================================================
// Update step
// ============================================================================

#[test]
fn test_end_to_end_single_step() {
    let drq = Drq::new(
        DrqConfig::new()
            .with_batch_size(4)
            .with_gamma(0.98)
            .with_ensemble(2, 2),
    )
    .unwrap();
    let state = toy_state(0, 2, TargetUpdate::Periodic(1));
    let batch = toy_batch(4, 1.0, 0.99);

    let (state, metrics) = drq.step(state, &batch).unwrap();

    assert_eq!(state.step(), 1);
    assert!(metrics.critic_loss.is_finite());
    assert!(metrics.actor_loss.is_finite());
    assert!(metrics.entropy.is_finite());
    assert!(metrics.is_finite());
    assert!((metrics.reward - 1.0).abs() < 1e-6);
    assert_eq!(flat_params(state.params()), flat_params(state.target_params()));
}

#[test]
fn test_step_is_deterministic() {
    let (state_a, metrics_a) = run(17, 3);
    let (state_b, metrics_b) = run(17, 3);

    assert_eq!(metrics_a, metrics_b);
    assert_eq!(flat_params(state_a.params()), flat_params(state_b.params()));
    assert_eq!(
        flat_params(state_a.target_params()),
        flat_params(state_b.target_params())
    );
    assert_eq!(state_a.rng(), state_b.rng());
}

#[test]
fn test_different_seeds_diverge() {
    let (_, metrics_a) = run(1, 1);
    let (_, metrics_b) = run(2, 1);
    assert_ne!(metrics_a, metrics_b);
}

#[test]
fn test_rng_is_never_reused() {
    let drq = drq(4);
    let batch = toy_batch(4, 1.0, 0.99);
    let state = toy_state(3, 3, TargetUpdate::Periodic(1));
    let input = state.rng().clone();
    let streams = StepStreams::split(input.clone());

    let (state, _) = drq.step(state, &batch).unwrap();
    let carried = state.rng().clone();

    assert_ne!(carried, input);
    assert_ne!(carried, streams.augment_obs);
    assert_ne!(carried, streams.augment_next_obs);
    assert_ne!(carried, streams.action);
    assert_ne!(carried, streams.ensemble);
    assert_eq!(carried, streams.carry);
}

#[test]
fn test_step_counter_monotonic() {
    let drq = drq(4);
    let batch = toy_batch(4, 0.5, 1.0);
    let mut state = toy_state(5, 3, TargetUpdate::Periodic(2));
    for expected in 1..=4 {
        let (next, _) = drq.step(state, &batch).unwrap();
        assert_eq!(next.step(), expected);
        state = next;
    }
}

#[test]
fn test_periodic_target_sync_through_steps() {
    let drq = drq(4);
    let batch = toy_batch(4, 1.0, 0.99);
    let mut state = toy_state(6, 3, TargetUpdate::Periodic(3));
    let initial = flat_params(state.target_params());

    for step in 1..=3 {
        let (next, _) = drq.step(state, &batch).unwrap();
        state = next;
        let live = flat_params(state.params());
        let target = flat_params(state.target_params());
        if step < 3 {
            assert_eq!(target, initial, "target moved at step {}", step);
        } else {
            assert_eq!(target, live);
        }
    }
}

#[test]
fn test_exponential_target_sync_through_step() {
    let drq = drq(4);
    let batch = toy_batch(4, 1.0, 0.99);
    let state = toy_state(7, 3, TargetUpdate::Exponential(0.1));
    let target_before = flat_params(state.target_params());

    let (state, _) = drq.step(state, &batch).unwrap();
    let live = flat_params(state.params());
    let target = flat_params(state.target_params());

    for i in 0..live.len() {
        let expected = 0.1 * live[i] + 0.9 * target_before[i];
        assert!(
            (target[i] - expected).abs() < 1e-5,
            "param {}: expected {}, got {}",
            i,
            expected,
            target[i]
        );
    }
}

#[test]
fn test_live_and_target_share_structure() {
    let (state, _) = run(8, 2);
    let live = param_layout(state.params());
    let target = param_layout(state.target_params());

    assert!(!live.is_empty());
    assert_eq!(live, target);
}

#[test]
fn test_default_config_step_updates_soft_target() {
    let config = CoderConfig::default().with_drq_batch_size(4);
    let drq = Drq::new(config.drq_config()).unwrap();
    let state = toy_state(5, config.ensemble_size, config.target_update());
    let target_before = flat_params(state.target_params());

    let (state, metrics) = drq.step(state, &toy_batch(4, 1.0, 0.99)).unwrap();

    assert_eq!(state.step(), 1);
    assert!(metrics.is_finite());
    assert_ne!(flat_params(state.target_params()), target_before);
    assert_eq!(param_layout(state.params()), param_layout(state.target_params()));
}

/// Parameter ids and shapes in traversal order.
fn param_layout(module: &ToyNetworks<B>) -> Vec<(ParamId, Vec<usize>)> {
    struct Layout(Vec<(ParamId, Vec<usize>)>);

    impl burn::module::ModuleVisitor<B> for Layout {
        fn visit_float<const D: usize>(&mut self, param: &burn::module::Param<Tensor<B, D>>) {
            self.0.push((param.id.clone(), param.val().dims().to_vec()));
        }
    }

    let mut layout = Layout(Vec::new());
    module.visit(&mut layout);
    layout.0
}

#[test]
fn test_frozen_critic_gets_no_actor_gradient() {
    let device = device();
    let networks = ToyNetworks::<B>::new(2, &device);
    let state = Tensor::<B, 2>::ones([3, crate::testing::STATE_DIM], &device);
    let action = networks.policy(state.clone()).mode();

    let loss = networks.clone().no_grad().critic(state, action).mean();
    let grads = GradientsParams::from_grads(loss.backward(), &networks);

    let with_grad = flat_params_with_grads(&networks, &grads);
    assert_eq!(with_grad, 1, "only the actor mean head should receive gradient");
}

/// Number of parameters of `module` that have a gradient.
fn flat_params_with_grads(module: &ToyNetworks<B>, grads: &GradientsParams) -> usize {
    struct Count<'a> {
        grads: &'a GradientsParams,
        n: usize,
    }
    impl<'a> burn::module::ModuleVisitor<B> for Count<'a> {
        fn visit_float<const D: usize>(&mut self, param: &burn::module::Param<Tensor<B, D>>) {
            if self
                .grads
                .get::<burn::backend::NdArray<f32>, D>(param.id.clone())
                .is_some()
            {
                self.n += 1;
            }
        }
    }
    let mut count = Count { grads, n: 0 };
    module.visit(&mut count);
    count.n
}

// ============================================================================
// Precondition errors
// ============================================================================

#[test]
fn test_wrong_batch_size_rejected() {
    let drq = drq(8);
    let state = toy_state(0, 3, TargetUpdate::Periodic(1));
    let err = drq.step(state, &toy_batch(4, 1.0, 1.0)).unwrap_err();
    assert!(matches!(
        err,
        DrqError::Shape(ShapeError::BatchSize {
            expected: 8,
            actual: 4,
            ..
        })
    ));
}

#[test]
fn test_action_dim_mismatch_rejected() {
    let drq = drq(4);
    let state = toy_state(0, 3, TargetUpdate::Periodic(1));
    let mut batch = toy_batch(4, 1.0, 1.0);
    batch.actions = Tensor::zeros([4, ACTION_DIM + 1], &device());

    let err = drq.step(state, &batch).unwrap_err();
    assert!(matches!(
        err,
        DrqError::Shape(ShapeError::ActionDim { expected: 2, actual: 3 })
    ));
}

#[test]
fn test_ensemble_smaller_than_subset_rejected() {
    let drq = drq(4);
    let state = toy_state(0, 1, TargetUpdate::Periodic(1));
    let err = drq.step(state, &toy_batch(4, 1.0, 1.0)).unwrap_err();
    assert!(matches!(
        err,
        DrqError::Shape(ShapeError::EnsembleSubsample {
            requested: 2,
            ensemble_size: 1
        })
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let err = Drq::new(DrqConfig::new().with_ensemble(2, 5)).unwrap_err();
    assert!(matches!(err, crate::error::ConfigError::SubsetTooLarge { .. }));
}

#[test]
fn test_nan_propagates_to_metrics() {
    let drq = drq(4);
    let state = toy_state(0, 3, TargetUpdate::Periodic(1));
    let batch = toy_batch(4, f32::NAN, 1.0);

    let (_, metrics) = drq.step(state, &batch).unwrap();
    assert!(metrics.reward.is_nan());
    assert!(metrics.critic_loss.is_nan());
    assert!(!metrics.is_finite());
}
