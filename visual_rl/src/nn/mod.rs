//! Neural network modules for pixel-based control.
//!
//! # Modules
//!
//! - [`coder`]: CNN encoder, Gaussian actor and ensemble critic implementing
//!   [`DrqNetworks`](crate::algorithms::DrqNetworks)

pub mod coder;

pub use coder::{CnnEncoder, CoderNetworks, CoderNetworksConfig, Mlp};
