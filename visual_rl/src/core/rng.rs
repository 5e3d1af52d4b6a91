//! Explicit, splittable randomness.
//!
//! Every random draw in the engine comes from a [`PrngKey`] that is threaded
//! through the call explicitly. There is no global generator: burn's backend
//! RNG (`Tensor::random`) is never used by the update path, so a run is fully
//! determined by the seed, the initial parameters and the batch sequence.
//!
//! # Single use
//!
//! A key is consumed by value. Splitting it yields fresh child keys and turning
//! it into a generator consumes it, so the borrow checker rejects any attempt
//! to draw twice from the same key:
//!
//! ```ignore
//! let key = PrngKey::new(0);
//! let [a, b] = key.split_array();
//! let mut rng = a.into_rng();
//! // key.into_rng(); // error: use of moved value
//! ```

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Opaque randomness cursor backed by a ChaCha8 seed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrngKey {
    seed: [u8; 32],
}

impl PrngKey {
    /// Derive the root key from an integer seed.
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self::draw(&mut rng)
    }

    fn draw(rng: &mut ChaCha8Rng) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self { seed }
    }

    /// Split into `n` independent child keys.
    ///
    /// Deterministic: the same key always yields the same children.
    pub fn split(self, n: usize) -> Vec<PrngKey> {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        (0..n).map(|_| Self::draw(&mut rng)).collect()
    }

    /// Split into a fixed number of child keys.
    pub fn split_array<const N: usize>(self) -> [PrngKey; N] {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        std::array::from_fn(|_| Self::draw(&mut rng))
    }

    /// Consume the key as a random generator.
    pub fn into_rng(self) -> ChaCha8Rng {
        ChaCha8Rng::from_seed(self.seed)
    }
}

/// Standard normal noise of shape `[rows, cols]`.
///
/// Each row is drawn from its own child key so that per-sample draws do not
/// depend on the batch size or on the other rows.
pub fn standard_normal<B: Backend>(
    key: PrngKey,
    rows: usize,
    cols: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let values: Vec<f32> = key
        .split(rows)
        .into_iter()
        .flat_map(|row_key| {
            let mut rng = row_key.into_rng();
            (0..cols)
                .map(|_| StandardNormal.sample(&mut rng))
                .collect::<Vec<f32>>()
        })
        .collect();

    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([rows, cols])
}
