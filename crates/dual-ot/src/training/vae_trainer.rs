//! VAE baseline training loop: mini-batch ELBO steps, one report per epoch.

use std::time::Instant;

use burn::data::dataloader::DataLoader;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};

use crate::data::ImageBatch;
use crate::error::{OtError, Result as OtResult};
use crate::model::vae::Vae;
use crate::training::loss::vae_loss;
use crate::training::metrics::RunningLoss;
use crate::training::optim::OptimizerChoice;

/// Configuration for VAE training.
#[derive(Config, Debug)]
pub struct VaeTrainingConfig {
    #[config(default = 100)]
    pub epochs: usize,
    #[config(default = 0.005)]
    pub lr: f64,
    #[config(default = "OptimizerChoice::default()")]
    pub optimizer: OptimizerChoice,
    /// Weight of the KL term (beta).
    #[config(default = 1.0)]
    pub kl_scale: f64,
    /// Mini-batch size, used for progress reporting.
    #[config(default = 128)]
    pub batch_size: usize,
    /// Seed for the backend RNG (reparameterization noise).
    pub seed: Option<u64>,
}

/// Run VAE training over `epochs` passes of `loader`.
pub fn train<B: AutodiffBackend>(
    config: &VaeTrainingConfig,
    model: Vae<B>,
    loader: &dyn DataLoader<ImageBatch<B>>,
) -> OtResult<Vae<B>> {
    match config.optimizer {
        OptimizerChoice::Sgd(settings) => fit(config, model, loader, settings.init::<B, Vae<B>>()),
        OptimizerChoice::Adam(settings) => fit(config, model, loader, settings.init_adam::<B, Vae<B>>()),
        OptimizerChoice::RAdam(settings) => fit(config, model, loader, settings.init_radam::<B, Vae<B>>()),
    }
}

fn fit<B, O>(
    config: &VaeTrainingConfig,
    mut model: Vae<B>,
    loader: &dyn DataLoader<ImageBatch<B>>,
    mut optimizer: O,
) -> OtResult<Vae<B>>
where
    B: AutodiffBackend,
    O: Optimizer<Vae<B>, B>,
{
    if !config.kl_scale.is_finite() || config.kl_scale < 0.0 {
        return Err(OtError::InvalidConfig(format!(
            "kl_scale must be finite and >= 0, got {}",
            config.kl_scale
        )));
    }
    if let Some(seed) = config.seed {
        B::seed(seed);
    }

    let batches_per_epoch = loader.num_items().div_ceil(config.batch_size.max(1));
    tracing::info!(
        epochs = config.epochs,
        items = loader.num_items(),
        batches_per_epoch,
        optimizer = %config.optimizer.kind(),
        lr = config.lr,
        kl_scale = config.kl_scale,
        "Starting VAE training"
    );

    let start = Instant::now();
    let mut running = RunningLoss::new();

    for epoch in 1..=config.epochs {
        running.reset();
        let pb = ProgressBar::new(batches_per_epoch as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        for batch in loader.iter() {
            let out = model.forward(batch.images.clone());
            let loss = vae_loss(
                out.reconstruction,
                batch.images,
                out.mean,
                out.logvar,
                config.kl_scale,
            );
            let loss_val: f64 = loss.clone().into_scalar().elem();

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.lr, model, grads);

            running.update(loss_val);
            pb.set_message(format!("loss={loss_val:.2}"));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let Some(epoch_loss) = running.mean() else {
            return Err(OtError::Dataset("data loader yielded no batches".to_string()));
        };
        println!("Epoch {epoch} : {epoch_loss:.5}");
        tracing::debug!(epoch, batches = running.count(), loss = epoch_loss, "VAE epoch");
    }

    tracing::info!(
        epochs = config.epochs,
        elapsed_secs = format!("{:.1}", start.elapsed().as_secs_f64()),
        "VAE training finished"
    );

    Ok(model)
}
