//! Learning algorithms and the adapters they consume.
//!
//! - [`augmentation`]: image augmentation (`RandomShift`)
//! - [`policy`]: diagonal Gaussian policy distribution
//! - [`networks`]: the `DrqNetworks` adapter trait
//! - [`drq`]: the DrQ update step

pub mod augmentation;
pub mod drq;
pub mod networks;
pub mod policy;

pub use augmentation::{Augmentation, RandomShift};
pub use drq::{CriticReduction, Drq, DrqConfig, StepStreams};
pub use networks::DrqNetworks;
pub use policy::DiagGaussian;
