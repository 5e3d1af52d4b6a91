//! Transition types for visual off-policy learning.
//!
//! - `ImageTransition`: host-side transition as stored by a replay buffer
//! - `Observation`: batched observation tensors (image + optional features)
//! - `TransitionBatch`: fixed-shape batch of (o, a, r, d, o') consumed by the
//!   update step
//!
//! Only the image field of an observation is augmented. Proprioceptive
//! features, when present, pass through untouched.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::ShapeError;

// ============================================================================
// Host-side transitions
// ============================================================================

/// Single observation on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageObservation {
    /// Image pixels in CHW order, flattened.
    pub image: Vec<f32>,
    /// Optional proprioceptive features.
    pub features: Option<Vec<f32>>,
}

impl ImageObservation {
    /// Create an image-only observation.
    pub fn new(image: Vec<f32>) -> Self {
        Self { image, features: None }
    }

    /// Attach proprioceptive features.
    pub fn with_features(mut self, features: Vec<f32>) -> Self {
        self.features = Some(features);
        self
    }
}

/// Host-side transition `(o, a, r, d, o')`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTransition {
    pub observation: ImageObservation,
    pub action: Vec<f32>,
    pub reward: f32,
    /// Continuation factor: 0.0 at terminal states, 1.0 otherwise.
    pub discount: f32,
    pub next_observation: ImageObservation,
}

impl ImageTransition {
    pub fn new(
        observation: ImageObservation,
        action: Vec<f32>,
        reward: f32,
        discount: f32,
        next_observation: ImageObservation,
    ) -> Self {
        Self {
            observation,
            action,
            reward,
            discount,
            next_observation,
        }
    }

    /// Build from a terminal flag instead of an explicit discount.
    pub fn from_terminal(
        observation: ImageObservation,
        action: Vec<f32>,
        reward: f32,
        terminal: bool,
        next_observation: ImageObservation,
    ) -> Self {
        let discount = if terminal { 0.0 } else { 1.0 };
        Self::new(observation, action, reward, discount, next_observation)
    }
}

// ============================================================================
// Batched tensors
// ============================================================================

/// Batched observation.
#[derive(Debug, Clone)]
pub struct Observation<B: Backend> {
    /// Images `[batch, channels, height, width]`.
    pub image: Tensor<B, 4>,
    /// Proprioceptive features `[batch, n_features]`.
    pub features: Option<Tensor<B, 2>>,
}

impl<B: Backend> Observation<B> {
    pub fn new(image: Tensor<B, 4>) -> Self {
        Self { image, features: None }
    }

    pub fn with_features(mut self, features: Tensor<B, 2>) -> Self {
        self.features = Some(features);
        self
    }

    /// Replace the image field, keeping the other fields.
    pub fn with_image(mut self, image: Tensor<B, 4>) -> Self {
        self.image = image;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.image.dims()[0]
    }

    fn check_batch(&self, prefix: Field, expected: usize) -> Result<(), ShapeError> {
        check_leading(prefix.image(), self.image.dims()[0], expected)?;
        if let Some(features) = &self.features {
            check_leading(prefix.features(), features.dims()[0], expected)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Field {
    Current,
    Next,
}

impl Field {
    fn image(self) -> &'static str {
        match self {
            Field::Current => "observations.image",
            Field::Next => "next_observations.image",
        }
    }

    fn features(self) -> &'static str {
        match self {
            Field::Current => "observations.features",
            Field::Next => "next_observations.features",
        }
    }
}

fn check_leading(field: &'static str, actual: usize, expected: usize) -> Result<(), ShapeError> {
    if actual != expected {
        return Err(ShapeError::BatchSize {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Fixed-size batch of transitions, batched along the leading axis.
#[derive(Debug, Clone)]
pub struct TransitionBatch<B: Backend> {
    pub observations: Observation<B>,
    /// Actions `[batch, action_dim]`.
    pub actions: Tensor<B, 2>,
    /// Rewards `[batch]`.
    pub rewards: Tensor<B, 1>,
    /// Discounts `[batch]`.
    pub discounts: Tensor<B, 1>,
    pub next_observations: Observation<B>,
}

impl<B: Backend> TransitionBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.rewards.dims()[0]
    }

    pub fn action_dim(&self) -> usize {
        self.actions.dims()[1]
    }

    /// Check every field against the configured batch size.
    ///
    /// Ranks are enforced by the tensor types; this checks leading
    /// dimensions and the agreement between current and next observations.
    pub fn validate(&self, batch_size: usize) -> Result<(), ShapeError> {
        self.observations.check_batch(Field::Current, batch_size)?;
        self.next_observations.check_batch(Field::Next, batch_size)?;
        check_leading("actions", self.actions.dims()[0], batch_size)?;
        check_leading("rewards", self.rewards.dims()[0], batch_size)?;
        check_leading("discounts", self.discounts.dims()[0], batch_size)?;

        let observation = self.observations.image.dims();
        let next_observation = self.next_observations.image.dims();
        if observation != next_observation {
            return Err(ShapeError::ImageShape {
                observation,
                next_observation,
            });
        }

        match (&self.observations.features, &self.next_observations.features) {
            (None, None) => {}
            (Some(a), Some(b)) if a.dims() == b.dims() => {}
            _ => return Err(ShapeError::FeatureMismatch),
        }

        Ok(())
    }

    /// Stack host-side transitions into a batch.
    ///
    /// `image_shape` is `[channels, height, width]`.
    pub fn from_transitions(
        transitions: &[ImageTransition],
        image_shape: [usize; 3],
        device: &B::Device,
    ) -> Result<Self, ShapeError> {
        let batch_size = transitions.len();
        if batch_size == 0 {
            return Err(ShapeError::Ragged("empty transition slice".to_string()));
        }

        let action_dim = transitions[0].action.len();
        let feature_dim = transitions[0].observation.features.as_ref().map(Vec::len);
        let pixels: usize = image_shape.iter().product();

        for (i, t) in transitions.iter().enumerate() {
            if t.action.len() != action_dim {
                return Err(ShapeError::Ragged(format!(
                    "transition {} has action width {}, expected {}",
                    i,
                    t.action.len(),
                    action_dim
                )));
            }
            for obs in [&t.observation, &t.next_observation] {
                if obs.image.len() != pixels {
                    return Err(ShapeError::Ragged(format!(
                        "transition {} has {} pixels, expected {}",
                        i,
                        obs.image.len(),
                        pixels
                    )));
                }
                if obs.features.as_ref().map(Vec::len) != feature_dim {
                    return Err(ShapeError::FeatureMismatch);
                }
            }
        }

        let stack = |select: fn(&ImageTransition) -> &ImageObservation| -> Observation<B> {
            let images: Vec<f32> = transitions
                .iter()
                .flat_map(|t| select(t).image.iter().copied())
                .collect();
            let [c, h, w] = image_shape;
            let image = Tensor::<B, 1>::from_floats(images.as_slice(), device)
                .reshape([batch_size, c, h, w]);

            let features = feature_dim.map(|dim| {
                let values: Vec<f32> = transitions
                    .iter()
                    .flat_map(|t| select(t).features.iter().flatten().copied())
                    .collect();
                Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([batch_size, dim])
            });

            Observation { image, features }
        };

        let actions: Vec<f32> = transitions.iter().flat_map(|t| t.action.iter().copied()).collect();
        let rewards: Vec<f32> = transitions.iter().map(|t| t.reward).collect();
        let discounts: Vec<f32> = transitions.iter().map(|t| t.discount).collect();

        Ok(Self {
            observations: stack(|t| &t.observation),
            actions: Tensor::<B, 1>::from_floats(actions.as_slice(), device)
                .reshape([batch_size, action_dim]),
            rewards: Tensor::from_floats(rewards.as_slice(), device),
            discounts: Tensor::from_floats(discounts.as_slice(), device),
            next_observations: stack(|t| &t.next_observation),
        })
    }
}
