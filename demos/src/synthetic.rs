//! Synthetic replay data: a bright square moving on a dark canvas.
//!
//! The first two action components push the square; reward is higher the
//! closer it ends to the canvas center. There is no environment loop, the
//! buffer is filled once up front with random actions.

use burn::tensor::backend::Backend;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use visual_rl::{BatchSource, ImageObservation, ImageTransition, TransitionBatch};

const SQUARE: usize = 3;
const MAX_STEP: f32 = 2.0;

pub struct SyntheticReplay<B: Backend> {
    transitions: Vec<ImageTransition>,
    image_shape: [usize; 3],
    rng: ChaCha8Rng,
    device: B::Device,
}

impl<B: Backend> SyntheticReplay<B> {
    pub fn generate(
        capacity: usize,
        image_shape: [usize; 3],
        action_dim: usize,
        seed: u64,
        device: &B::Device,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let [_, height, width] = image_shape;
        let max_y = (height - SQUARE) as f32;
        let max_x = (width - SQUARE) as f32;

        let transitions = (0..capacity)
            .map(|_| {
                let y = rng.gen_range(0.0..=max_y);
                let x = rng.gen_range(0.0..=max_x);
                let action: Vec<f32> = (0..action_dim).map(|_| rng.gen_range(-1.0..=1.0)).collect();

                let dy = action.first().copied().unwrap_or(0.0) * MAX_STEP;
                let dx = action.get(1).copied().unwrap_or(0.0) * MAX_STEP;
                let next_y = (y + dy).clamp(0.0, max_y);
                let next_x = (x + dx).clamp(0.0, max_x);

                let distance = ((next_y - max_y / 2.0).powi(2) + (next_x - max_x / 2.0).powi(2)).sqrt();
                let reward = 1.0 - distance / (max_y.hypot(max_x) / 2.0);
                let terminal = rng.gen_bool(0.01);

                ImageTransition::from_terminal(
                    frame(image_shape, y, x),
                    action,
                    reward,
                    terminal,
                    frame(image_shape, next_y, next_x),
                )
            })
            .collect();

        Self {
            transitions,
            image_shape,
            rng,
            device: device.clone(),
        }
    }
}

fn frame(image_shape: [usize; 3], y: f32, x: f32) -> ImageObservation {
    let [channels, height, width] = image_shape;
    let (top, left) = (y.round() as usize, x.round() as usize);
    let mut image = vec![0.0; channels * height * width];
    for c in 0..channels {
        for row in top..(top + SQUARE).min(height) {
            for col in left..(left + SQUARE).min(width) {
                image[(c * height + row) * width + col] = 1.0;
            }
        }
    }
    ImageObservation::new(image)
}

impl<B: Backend> BatchSource<B> for SyntheticReplay<B> {
    fn sample(&mut self, batch_size: usize) -> Option<TransitionBatch<B>> {
        if self.transitions.len() < batch_size {
            return None;
        }

        let picked: Vec<ImageTransition> = index::sample(&mut self.rng, self.transitions.len(), batch_size)
            .iter()
            .map(|i| self.transitions[i].clone())
            .collect();

        match TransitionBatch::from_transitions(&picked, self.image_shape, &self.device) {
            Ok(batch) => Some(batch),
            Err(e) => {
                log::warn!("Dropping malformed batch: {}", e);
                None
            }
        }
    }
}
