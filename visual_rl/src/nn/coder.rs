//! Reference networks for pixel-based control.
//!
//! ```text
//! image [B, C, H, W]
//!   └─ conv(k, s) + relu  × len(cnn_depths)      valid padding
//!   └─ flatten → linear → layer norm → tanh      [B, cnn_emb_dim]
//!   └─ concat proprioceptive features            [B, cnn_emb_dim + feature_dim]  = state
//!
//! actor:   state ─ (linear → layer norm → relu) × len(actor_layers) ─ linear → (μ, raw log σ)
//! critic:  E independent heads on [state, action], same block structure, one Q each
//! ```
//!
//! Parameters are created with burn's default initializers. The update path
//! itself never draws from the backend generator.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;
use serde::{Deserialize, Serialize};

use crate::algorithms::networks::DrqNetworks;
use crate::algorithms::policy::{clamp_log_std, DiagGaussian};
use crate::core::transition::Observation;
use crate::error::ConfigError;

/// Architecture of [`CoderNetworks`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoderNetworksConfig {
    /// Observation image `[channels, height, width]`.
    pub image_shape: [usize; 3],
    /// Width of the proprioceptive feature vector (0 = images only).
    pub feature_dim: usize,
    pub action_dim: usize,
    pub cnn_emb_dim: usize,
    pub cnn_depths: Vec<usize>,
    pub cnn_kernels: Vec<usize>,
    pub cnn_strides: Vec<usize>,
    pub actor_layers: Vec<usize>,
    pub critic_layers: Vec<usize>,
    pub ensemble_size: usize,
}

impl CoderNetworksConfig {
    pub fn new(image_shape: [usize; 3], action_dim: usize) -> Self {
        Self {
            image_shape,
            feature_dim: 0,
            action_dim,
            cnn_emb_dim: 64,
            cnn_depths: vec![64, 64, 64, 64],
            cnn_kernels: vec![3, 3, 3, 3],
            cnn_strides: vec![2, 2, 2, 2],
            actor_layers: vec![64, 64],
            critic_layers: vec![64, 64, 64],
            ensemble_size: 2,
        }
    }

    pub fn with_feature_dim(mut self, feature_dim: usize) -> Self {
        self.feature_dim = feature_dim;
        self
    }

    pub fn with_cnn(
        mut self,
        emb_dim: usize,
        depths: Vec<usize>,
        kernels: Vec<usize>,
        strides: Vec<usize>,
    ) -> Self {
        self.cnn_emb_dim = emb_dim;
        self.cnn_depths = depths;
        self.cnn_kernels = kernels;
        self.cnn_strides = strides;
        self
    }

    pub fn with_actor_layers(mut self, layers: Vec<usize>) -> Self {
        self.actor_layers = layers;
        self
    }

    pub fn with_critic_layers(mut self, layers: Vec<usize>) -> Self {
        self.critic_layers = layers;
        self
    }

    pub fn with_ensemble_size(mut self, ensemble_size: usize) -> Self {
        self.ensemble_size = ensemble_size;
        self
    }

    /// Width of the state vector fed to the heads.
    pub fn state_dim(&self) -> usize {
        self.cnn_emb_dim + self.feature_dim
    }

    /// Shape `[depth, height, width]` of the last convolution output.
    pub fn conv_output_shape(&self) -> Result<[usize; 3], ConfigError> {
        let n = self.cnn_depths.len();
        if self.cnn_kernels.len() != n || self.cnn_strides.len() != n {
            return Err(ConfigError::Architecture(format!(
                "cnn_depths, cnn_kernels and cnn_strides have lengths {}, {}, {}",
                n,
                self.cnn_kernels.len(),
                self.cnn_strides.len()
            )));
        }

        let [channels, mut height, mut width] = self.image_shape;
        let mut depth = channels;
        for (layer, ((&d, &k), &s)) in self
            .cnn_depths
            .iter()
            .zip(&self.cnn_kernels)
            .zip(&self.cnn_strides)
            .enumerate()
        {
            if d == 0 || k == 0 || s == 0 {
                return Err(ConfigError::Architecture(format!(
                    "conv layer {} has zero depth, kernel or stride",
                    layer
                )));
            }
            if k > height || k > width {
                return Err(ConfigError::Architecture(format!(
                    "conv layer {} kernel {} exceeds its {}x{} input",
                    layer, k, height, width
                )));
            }
            height = (height - k) / s + 1;
            width = (width - k) / s + 1;
            depth = d;
        }
        Ok([depth, height, width])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("action_dim", self.action_dim),
            ("cnn_emb_dim", self.cnn_emb_dim),
            ("ensemble_size", self.ensemble_size),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidCount { field, value });
            }
        }
        if self.image_shape.contains(&0) {
            return Err(ConfigError::Architecture(format!(
                "empty image shape {:?}",
                self.image_shape
            )));
        }
        if self.actor_layers.contains(&0) || self.critic_layers.contains(&0) {
            return Err(ConfigError::Architecture(
                "hidden layer widths must be positive".to_string(),
            ));
        }
        self.conv_output_shape().map(|_| ())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<CoderNetworks<B>, ConfigError> {
        self.validate()?;
        let [depth, height, width] = self.conv_output_shape()?;

        let mut in_channels = self.image_shape[0];
        let convs = self
            .cnn_depths
            .iter()
            .zip(&self.cnn_kernels)
            .zip(&self.cnn_strides)
            .map(|((&d, &k), &s)| {
                let conv = Conv2dConfig::new([in_channels, d], [k, k])
                    .with_stride([s, s])
                    .init(device);
                in_channels = d;
                conv
            })
            .collect();

        let encoder = CnnEncoder {
            convs,
            projection: LinearConfig::new(depth * height * width, self.cnn_emb_dim).init(device),
            norm: LayerNormConfig::new(self.cnn_emb_dim).init(device),
        };

        let state_dim = self.state_dim();
        let actor = Mlp::new(state_dim, &self.actor_layers, 2 * self.action_dim, device);
        let critics = (0..self.ensemble_size)
            .map(|_| Mlp::new(state_dim + self.action_dim, &self.critic_layers, 1, device))
            .collect();

        Ok(CoderNetworks {
            encoder,
            actor,
            critics,
            action_dim: self.action_dim,
        })
    }
}

// ============================================================================
// Building blocks
// ============================================================================

#[derive(Module, Debug)]
pub struct CnnEncoder<B: Backend> {
    convs: Vec<Conv2d<B>>,
    projection: Linear<B>,
    norm: LayerNorm<B>,
}

impl<B: Backend> CnnEncoder<B> {
    pub fn forward(&self, image: Tensor<B, 4>) -> Tensor<B, 2> {
        let batch_size = image.dims()[0];
        let mut x = image;
        for conv in &self.convs {
            x = relu(conv.forward(x));
        }
        let [_, d, h, w] = x.dims();
        let flat = x.reshape([batch_size, d * h * w]);
        self.norm.forward(self.projection.forward(flat)).tanh()
    }
}

/// Linear → layer norm → relu blocks followed by a linear output.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    layers: Vec<Linear<B>>,
    norms: Vec<LayerNorm<B>>,
    output: Linear<B>,
}

impl<B: Backend> Mlp<B> {
    pub fn new(d_input: usize, hidden: &[usize], d_output: usize, device: &B::Device) -> Self {
        let mut layers = Vec::with_capacity(hidden.len());
        let mut norms = Vec::with_capacity(hidden.len());
        let mut width = d_input;
        for &h in hidden {
            layers.push(LinearConfig::new(width, h).init(device));
            norms.push(LayerNormConfig::new(h).init(device));
            width = h;
        }
        Self {
            layers,
            norms,
            output: LinearConfig::new(width, d_output).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for (layer, norm) in self.layers.iter().zip(&self.norms) {
            x = relu(norm.forward(layer.forward(x)));
        }
        self.output.forward(x)
    }
}

// ============================================================================
// CoderNetworks
// ============================================================================

/// CNN encoder, Gaussian actor and ensemble critic in one module, so that
/// live and target copies are whole-module clones.
#[derive(Module, Debug)]
pub struct CoderNetworks<B: Backend> {
    encoder: CnnEncoder<B>,
    actor: Mlp<B>,
    critics: Vec<Mlp<B>>,
    #[module(skip)]
    action_dim: usize,
}

impl<B: Backend> DrqNetworks<B> for CoderNetworks<B> {
    fn encode(&self, observation: &Observation<B>) -> Tensor<B, 2> {
        let embedding = self.encoder.forward(observation.image.clone());
        match &observation.features {
            Some(features) => Tensor::cat(vec![embedding, features.clone()], 1),
            None => embedding,
        }
    }

    fn policy(&self, state: Tensor<B, 2>) -> DiagGaussian<B> {
        let out = self.actor.forward(state);
        let mean = out.clone().narrow(1, 0, self.action_dim);
        let log_std = clamp_log_std(out.narrow(1, self.action_dim, self.action_dim));
        DiagGaussian::new(mean, log_std)
    }

    fn critic(&self, state: Tensor<B, 2>, action: Tensor<B, 2>) -> Tensor<B, 2> {
        let input = Tensor::cat(vec![state, action], 1);
        let values = self
            .critics
            .iter()
            .map(|head| head.forward(input.clone()))
            .collect();
        Tensor::cat(values, 1)
    }

    fn ensemble_size(&self) -> usize {
        self.critics.len()
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }
}
