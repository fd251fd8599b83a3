//! Model components: the input-convex potential, its positivity-constrained
//! layers, the VAE baseline, and host/tensor conversion helpers.

pub mod bridge;
pub mod icnn;
pub mod init;
pub mod positive_linear;
pub mod potential;
pub mod vae;
