//! Generative modelling with Kantorovich potentials.
//!
//! An input-convex neural network is trained as the dual potential of a
//! quadratic-cost optimal transport problem between uniform noise and a
//! target dataset; the gradient of the trained potential maps noise to
//! samples. A convolutional VAE is provided as a baseline.

pub mod data;
pub mod error;
pub mod image_grid;
pub mod model;
pub mod sampler;
pub mod training;

pub use error::{OtError, Result};
pub use model::icnn::{Activation, IcnnConfig, IcnnPotential};
pub use model::potential::ConvexPotential;
pub use model::vae::{Vae, VaeConfig};
pub use training::optim::{OptimizerChoice, OptimizerKind};
pub use training::trainer::DualTrainingConfig;
pub use training::vae_trainer::VaeTrainingConfig;
