//! Dual-potential training loop.
//!
//! Each epoch is a single full-batch step: draw fresh uniform source noise,
//! evaluate the potential, compute the semi-dual objective against the fixed
//! target set, step the optimizer, then clamp the positivity-constrained
//! weights.

use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Distribution;

use crate::error::{OtError, Result as OtResult};
use crate::model::potential::ConvexPotential;
use crate::training::loss::dual_objective;
use crate::training::metrics::{PrintCadence, RunningLoss};
use crate::training::optim::OptimizerChoice;

/// Configuration for dual-potential training.
#[derive(Config, Debug)]
pub struct DualTrainingConfig {
    /// Number of full-batch steps.
    #[config(default = 10)]
    pub epochs: usize,
    /// Source batch size drawn each epoch.
    #[config(default = 5000)]
    pub batch_count: usize,
    /// Learning rate.
    #[config(default = 0.005)]
    pub lr: f64,
    #[config(default = "OptimizerChoice::default()")]
    pub optimizer: OptimizerChoice,
    /// Entropic smoothing of the max; 0 disables it.
    #[config(default = 0.0)]
    pub eps: f64,
    /// Divisor applied to the reported running loss.
    #[config(default = 1000)]
    pub iters: usize,
    /// Seed for the backend RNG (source noise).
    pub seed: Option<u64>,
}

impl DualTrainingConfig {
    /// Checks everything that can be rejected before the first step.
    pub fn validate(&self) -> OtResult<PrintCadence> {
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(OtError::InvalidConfig(format!(
                "eps must be finite and >= 0, got {}",
                self.eps
            )));
        }
        if self.batch_count == 0 {
            return Err(OtError::InvalidConfig("batch_count must be positive".to_string()));
        }
        if self.iters == 0 {
            return Err(OtError::InvalidConfig("iters must be positive".to_string()));
        }
        PrintCadence::for_epochs(self.epochs)
    }
}

/// Run dual-potential training.
///
/// # Arguments
/// - `config`: training hyperparameters
/// - `model`: initialized potential (consumed and returned updated)
/// - `target_rows`: target samples, shape `(m, d)`; transposed once internally
/// - `device`: burn device for tensor operations
///
/// # Returns
/// The trained potential.
pub fn train<B, M>(
    config: &DualTrainingConfig,
    model: M,
    target_rows: Tensor<B, 2>,
    device: &B::Device,
) -> OtResult<M>
where
    B: AutodiffBackend,
    M: ConvexPotential<B> + AutodiffModule<B>,
{
    match config.optimizer {
        OptimizerChoice::Sgd(settings) => fit(config, model, target_rows, device, settings.init::<B, M>()),
        OptimizerChoice::Adam(settings) => {
            fit(config, model, target_rows, device, settings.init_adam::<B, M>())
        }
        OptimizerChoice::RAdam(settings) => {
            fit(config, model, target_rows, device, settings.init_radam::<B, M>())
        }
    }
}

fn fit<B, M, O>(
    config: &DualTrainingConfig,
    mut model: M,
    target_rows: Tensor<B, 2>,
    device: &B::Device,
    mut optimizer: O,
) -> OtResult<M>
where
    B: AutodiffBackend,
    M: ConvexPotential<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let cadence = config.validate()?;
    let dims = model.input_dim();
    let [target_count, target_dims] = target_rows.dims();
    if target_dims != dims {
        return Err(OtError::InvalidConfig(format!(
            "target dimension {target_dims} does not match potential input dimension {dims}"
        )));
    }
    if target_count == 0 {
        return Err(OtError::InvalidConfig("target set is empty".to_string()));
    }

    if let Some(seed) = config.seed {
        B::seed(seed);
    }

    // (m, d) -> (d, m), constant for the whole run
    let target = target_rows.transpose().detach();

    tracing::info!(
        epochs = config.epochs,
        batch_count = config.batch_count,
        target_count,
        dims,
        optimizer = %config.optimizer.kind(),
        lr = config.lr,
        eps = config.eps,
        report_every = cadence.every(),
        "Starting dual training"
    );

    let start = Instant::now();
    let mut running = RunningLoss::new();

    for epoch in 1..=config.epochs {
        let source = Tensor::<B, 2>::random(
            [config.batch_count, dims],
            Distribution::Uniform(0.0, 1.0),
            device,
        );

        let y_hat = model.potential(source.clone());
        let loss = dual_objective(source, y_hat, target.clone(), config.eps);
        let loss_val: f64 = loss.clone().into_scalar().elem();

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optimizer.step(config.lr, model, grads);
        model = model.enforce_non_negativity();

        running.reset();
        running.update(loss_val);

        if cadence.is_due(epoch) {
            let reported = running.sum() / config.iters as f64;
            println!("{reported:.5}");
            tracing::debug!(epoch, loss = loss_val, reported, "dual step");
        }
    }

    tracing::info!(
        epochs = config.epochs,
        elapsed_secs = format!("{:.1}", start.elapsed().as_secs_f64()),
        "Dual training finished"
    );

    Ok(model)
}
