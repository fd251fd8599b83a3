//! Training: the dual objective and VAE loss terms, optimizer selection,
//! loss bookkeeping, and the two training loops.

pub mod loss;
pub mod metrics;
pub mod optim;
pub mod trainer;
pub mod vae_trainer;
