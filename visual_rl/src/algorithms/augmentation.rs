//! Image augmentation.
//!
//! [`RandomShift`] is the DrQ augmentation: pad each image by `max_shift`
//! pixels on every side, repeating the border pixels, then crop back to the
//! original size at a random offset. Every sample in the batch gets its own
//! offset, drawn from its own child key.
//!
//! ```text
//! [B, C, H, W] ─pad(replicate)→ [B, C, H+2s, W+2s] ─crop(dy_i, dx_i)→ [B, C, H, W]
//!                                     dy_i, dx_i ~ U{0, ..., 2s}
//! ```

use burn::prelude::*;
use rand::Rng;

use crate::core::rng::PrngKey;

/// Pure image transform driven by an explicit key.
pub trait Augmentation<B: Backend> {
    /// Augment a batch of images `[batch, channels, height, width]`.
    fn augment(&self, key: PrngKey, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Random pixel shift with replicate padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomShift {
    pub max_shift: usize,
}

impl RandomShift {
    pub fn new(max_shift: usize) -> Self {
        Self { max_shift }
    }

    /// Crop offsets `(dy, dx)` into the padded image, one per sample.
    pub fn offsets(&self, key: PrngKey, batch_size: usize) -> Vec<(usize, usize)> {
        let span = 2 * self.max_shift;
        key.split(batch_size)
            .into_iter()
            .map(|sample_key| {
                let mut rng = sample_key.into_rng();
                let dy = rng.gen_range(0..=span);
                let dx = rng.gen_range(0..=span);
                (dy, dx)
            })
            .collect()
    }
}

/// Pad `pad` pixels on both ends of `dim` by repeating the edge slices.
fn replicate_pad<B: Backend>(images: Tensor<B, 4>, dim: usize, pad: usize) -> Tensor<B, 4> {
    let size = images.dims()[dim];
    let first = images.clone().narrow(dim, 0, 1);
    let last = images.clone().narrow(dim, size - 1, 1);

    let mut parts = vec![first; pad];
    parts.push(images);
    parts.extend(std::iter::repeat(last).take(pad));
    Tensor::cat(parts, dim)
}

impl<B: Backend> Augmentation<B> for RandomShift {
    fn augment(&self, key: PrngKey, images: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.max_shift == 0 {
            return images;
        }

        let [batch_size, _, height, width] = images.dims();
        let padded = replicate_pad(replicate_pad(images, 2, self.max_shift), 3, self.max_shift);

        let crops = self
            .offsets(key, batch_size)
            .into_iter()
            .enumerate()
            .map(|(i, (dy, dx))| {
                padded
                    .clone()
                    .narrow(0, i, 1)
                    .narrow(2, dy, height)
                    .narrow(3, dx, width)
            })
            .collect();

        Tensor::cat(crops, 0)
    }
}
