use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::Distribution;

use crate::error::{OtError, Result as OtResult};
use crate::training::loss::reparameterize;

/// Configuration for the convolutional VAE baseline.
///
/// ```text
/// (batch, c, s, s)
///   → [Conv 4x4/2 → BN → ReLU] x3      c → k/4 → k/2 → k,  s → s/8
///   → flatten → q_mean, q_logvar        (batch, z)
///   → z = mean + exp(0.5 logvar) * noise
///   → project → (batch, k, s/8, s/8)
///   → [ConvT 4x4/2 → BN → ReLU] x2, ConvT 4x4/2 → sigmoid
///   → (batch, c, s, s)
/// ```
#[derive(Config, Debug)]
pub struct VaeConfig {
    /// Side length of the square input images; divisible by 8.
    #[config(default = 32)]
    pub image_size: usize,
    /// Image channels (3 for CIFAR-10).
    #[config(default = 3)]
    pub channel_num: usize,
    /// Channel width of the deepest feature map; divisible by 4.
    #[config(default = 128)]
    pub kernel_num: usize,
    /// Latent dimensionality.
    #[config(default = 128)]
    pub z_size: usize,
}

/// Conv → BatchNorm → ReLU block.
#[derive(Module, Debug)]
struct EncoderBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> EncoderBlock<B> {
    fn new(c_in: usize, c_out: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([c_in, c_out], [4, 4])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            norm: BatchNormConfig::new(c_out).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.norm.forward(self.conv.forward(x)))
    }
}

/// ConvTranspose → BatchNorm → ReLU block.
#[derive(Module, Debug)]
struct DecoderBlock<B: Backend> {
    deconv: ConvTranspose2d<B>,
    norm: BatchNorm<B, 2>,
}

impl<B: Backend> DecoderBlock<B> {
    fn new(c_in: usize, c_out: usize, device: &B::Device) -> Self {
        Self {
            deconv: upsample(c_in, c_out, device),
            norm: BatchNormConfig::new(c_out).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.norm.forward(self.deconv.forward(x)))
    }
}

fn upsample<B: Backend>(c_in: usize, c_out: usize, device: &B::Device) -> ConvTranspose2d<B> {
    ConvTranspose2dConfig::new([c_in, c_out], [4, 4])
        .with_stride([2, 2])
        .with_padding([1, 1])
        .init(device)
}

/// Output of a full VAE pass over a batch.
#[derive(Debug, Clone)]
pub struct VaeOutput<B: Backend> {
    /// Posterior mean, shape (batch, z).
    pub mean: Tensor<B, 2>,
    /// Posterior log-variance, shape (batch, z).
    pub logvar: Tensor<B, 2>,
    /// Reconstruction in `[0, 1]`, shape (batch, c, s, s).
    pub reconstruction: Tensor<B, 4>,
    /// Sampled latent, shape (batch, z).
    pub latent: Tensor<B, 2>,
}

/// Variational autoencoder trained by ELBO maximization.
#[derive(Module, Debug)]
pub struct Vae<B: Backend> {
    encoder: Vec<EncoderBlock<B>>,
    q_mean: Linear<B>,
    q_logvar: Linear<B>,
    project: Linear<B>,
    decoder: Vec<DecoderBlock<B>>,
    output: ConvTranspose2d<B>,
    kernel_num: usize,
    feature_size: usize,
    z_size: usize,
}

impl VaeConfig {
    /// Validate sizes and initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> OtResult<Vae<B>> {
        if self.image_size == 0 || self.image_size % 8 != 0 {
            return Err(OtError::InvalidConfig(format!(
                "VAE image_size must be a positive multiple of 8, got {}",
                self.image_size
            )));
        }
        if self.kernel_num < 4 || self.kernel_num % 4 != 0 {
            return Err(OtError::InvalidConfig(format!(
                "VAE kernel_num must be a positive multiple of 4, got {}",
                self.kernel_num
            )));
        }
        if self.channel_num == 0 || self.z_size == 0 {
            return Err(OtError::InvalidConfig(
                "VAE channel_num and z_size must be positive".to_string(),
            ));
        }

        let k = self.kernel_num;
        let feature_size = self.image_size / 8;
        let feature_volume = k * feature_size * feature_size;

        Ok(Vae {
            encoder: vec![
                EncoderBlock::new(self.channel_num, k / 4, device),
                EncoderBlock::new(k / 4, k / 2, device),
                EncoderBlock::new(k / 2, k, device),
            ],
            q_mean: LinearConfig::new(feature_volume, self.z_size).init(device),
            q_logvar: LinearConfig::new(feature_volume, self.z_size).init(device),
            project: LinearConfig::new(self.z_size, feature_volume).init(device),
            decoder: vec![
                DecoderBlock::new(k, k / 2, device),
                DecoderBlock::new(k / 2, k / 4, device),
            ],
            output: upsample(k / 4, self.channel_num, device),
            kernel_num: k,
            feature_size,
            z_size: self.z_size,
        })
    }
}

impl<B: Backend> Vae<B> {
    /// Encode images into the posterior `(mean, logvar)`.
    pub fn encode(&self, images: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let features = self
            .encoder
            .iter()
            .fold(images, |x, block| block.forward(x));
        let flat: Tensor<B, 2> = features.flatten(1, 3);
        (self.q_mean.forward(flat.clone()), self.q_logvar.forward(flat))
    }

    /// Decode latents into images in `[0, 1]`.
    pub fn decode(&self, latent: Tensor<B, 2>) -> Tensor<B, 4> {
        let [batch, _] = latent.dims();
        let projected = self.project.forward(latent).reshape([
            batch,
            self.kernel_num,
            self.feature_size,
            self.feature_size,
        ]);
        let x = self
            .decoder
            .iter()
            .fold(projected, |x, block| block.forward(x));
        sigmoid(self.output.forward(x))
    }

    /// Full pass: encode, reparameterize with fresh standard-normal noise, decode.
    pub fn forward(&self, images: Tensor<B, 4>) -> VaeOutput<B> {
        let (mean, logvar) = self.encode(images);
        let noise = Tensor::random(mean.dims(), Distribution::Normal(0.0, 1.0), &mean.device());
        let latent = reparameterize(mean.clone(), logvar.clone(), noise);
        let reconstruction = self.decode(latent.clone());
        VaeOutput {
            mean,
            logvar,
            reconstruction,
            latent,
        }
    }

    /// Decode `count` latents drawn from the standard normal prior.
    pub fn sample(&self, count: usize, device: &B::Device) -> Tensor<B, 4> {
        let z = Tensor::random([count, self.z_size], Distribution::Normal(0.0, 1.0), device);
        self.decode(z)
    }

    pub fn z_size(&self) -> usize {
        self.z_size
    }
}
