//! Target datasets: MNIST digits for the dual potential, CIFAR-10 binary
//! batches for the VAE, and a synthetic Gaussian mixture.

pub mod cifar;
pub mod mnist;
pub mod synthetic;

use burn::prelude::*;

/// A mini-batch of images in `[0, 1]`, shape `(batch, channels, height, width)`.
#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    pub images: Tensor<B, 4>,
}
