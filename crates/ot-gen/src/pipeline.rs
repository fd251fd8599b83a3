//! Training pipelines for the `dual` and `vae` subcommands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use clap::{Args, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;

use dual_ot::data::cifar::{
    cifar_loader, Cifar10Dataset, CifarBatcher, CIFAR_CHANNELS, CIFAR_SIDE,
};
use dual_ot::data::mnist::{self, MNIST_DIMS, MNIST_SIDE};
use dual_ot::image_grid::{save_flat_grid, save_grid, save_json_rows};
use dual_ot::model::bridge::{rows_to_tensor, tensor_to_f64};
use dual_ot::sampler::sample_potential;
use dual_ot::training::metrics::mmd;
use dual_ot::training::{trainer, vae_trainer};
use dual_ot::{
    DualTrainingConfig, IcnnConfig, OptimizerChoice, OptimizerKind, OtError, VaeConfig,
    VaeTrainingConfig,
};

use crate::config::{load_or_default, RunToml};

/// Number of images written to the sample grid.
pub const SAMPLE_COUNT: usize = 64;

/// Flags shared by both subcommands.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Mini-batch size of the data loader.
    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,
    /// Optimizer: sgd, adam or radam.
    #[arg(long, default_value = "adam")]
    pub optimizer: String,
    /// Learning rate.
    #[arg(long, default_value_t = 0.005)]
    pub lr: f64,
    /// Momentum for sgd, beta1 for adam and radam.
    #[arg(long, default_value_t = 0.9)]
    pub beta1: f64,
    #[arg(long, default_value_t = 0.999)]
    pub beta2: f64,
    /// Nesterov momentum (sgd only).
    #[arg(long)]
    pub nesterov: bool,
    /// Divisor of the printed running loss.
    #[arg(long, default_value_t = 1000)]
    pub iters: usize,
    #[arg(long, default_value_t = 0)]
    pub mean: i64,
    #[arg(long, default_value_t = 1)]
    pub std: i64,
    #[arg(long, default_value_t = 10)]
    pub m: usize,
    /// Source batch size and number of target samples.
    #[arg(long, default_value_t = 5000)]
    pub n: usize,
    #[arg(long, default_value_t = 100)]
    pub k: usize,
    /// Entropic smoothing of the dual objective (0 disables it).
    #[arg(long, default_value_t = 0.0)]
    pub eps: f64,
    /// Seed for the backend RNG, the data shuffle and the synthetic target.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Optional TOML run config with [icnn], [vae] and [data] sections.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CommonArgs {
    fn optimizer_choice(&self) -> Result<OptimizerChoice, OtError> {
        let kind: OptimizerKind = self.optimizer.parse()?;
        Ok(OptimizerChoice::from_flags(kind, self.beta1, self.beta2, self.nesterov))
    }

    fn arguments(&self) -> Vec<(&'static str, String)> {
        vec![
            ("batch_size", self.batch_size.to_string()),
            ("optimizer", self.optimizer.clone()),
            ("lr", self.lr.to_string()),
            ("beta1", self.beta1.to_string()),
            ("beta2", self.beta2.to_string()),
            ("nesterov", self.nesterov.to_string()),
            ("iters", self.iters.to_string()),
            ("mean", self.mean.to_string()),
            ("std", self.std.to_string()),
            ("m", self.m.to_string()),
            ("n", self.n.to_string()),
            ("k", self.k.to_string()),
            ("eps", self.eps.to_string()),
            ("seed", display_option(&self.seed)),
            ("config", display_option(&self.config.as_ref().map(|p| p.display()))),
        ]
    }

    /// Flags accepted for compatibility that the training loops never read.
    fn log_unused(&self) {
        tracing::debug!(
            k = self.k,
            m = self.m,
            mean = self.mean,
            std = self.std,
            "Flags accepted but unused by training"
        );
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Target distribution of the dual subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetKind {
    /// First `n` MNIST training digits.
    Mnist,
    /// Synthetic Gaussian mixture from the `[data]` config section.
    GaussianMixture,
}

/// Arguments for the `dual` subcommand.
#[derive(Debug, Clone, Args)]
pub struct DualArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Number of full-batch training steps.
    #[arg(long, default_value_t = 10)]
    pub epoch: usize,
    /// Sample dimensionality (784 for MNIST).
    #[arg(long, default_value_t = 784)]
    pub dims: usize,
    #[arg(long, value_enum, default_value_t = TargetKind::Mnist)]
    pub target: TargetKind,
    /// Path of the sample grid; non-image runs write `samples.json` next to it.
    #[arg(long, default_value = "./mnist.png")]
    pub output: PathBuf,
}

impl DualArgs {
    pub fn arguments(&self) -> Vec<(&'static str, String)> {
        let mut args = self.common.arguments();
        args.extend([
            ("epoch", self.epoch.to_string()),
            ("dims", self.dims.to_string()),
            ("target", format!("{:?}", self.target)),
            ("output", self.output.display().to_string()),
        ]);
        args
    }
}

/// Arguments for the `vae` subcommand.
#[derive(Debug, Clone, Args)]
pub struct VaeArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Number of passes over the training set.
    #[arg(long, default_value_t = 100)]
    pub epoch: usize,
    /// Latent dimensionality.
    #[arg(long, default_value_t = 128)]
    pub dims: usize,
    /// Weight of the KL term.
    #[arg(long, default_value_t = 1.0)]
    pub kl_scale: f64,
    /// Log per-channel statistics of the target distribution.
    #[arg(long)]
    pub gen_theor: bool,
    #[arg(long)]
    pub gaussian_support: bool,
    /// Directory with the CIFAR-10 binary batches.
    #[arg(long, default_value = "./data/cifar-10-batches-bin")]
    pub data_dir: PathBuf,
    /// Path of the sample grid.
    #[arg(long, default_value = "./cifar.png")]
    pub output: PathBuf,
}

impl VaeArgs {
    pub fn arguments(&self) -> Vec<(&'static str, String)> {
        let mut args = self.common.arguments();
        args.extend([
            ("epoch", self.epoch.to_string()),
            ("dims", self.dims.to_string()),
            ("kl_scale", self.kl_scale.to_string()),
            ("gen_theor", self.gen_theor.to_string()),
            ("gaussian_support", self.gaussian_support.to_string()),
            ("data_dir", self.data_dir.display().to_string()),
            ("output", self.output.display().to_string()),
        ]);
        args
    }
}

fn display_option<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "None".to_string(), ToString::to_string)
}

/// Render the argument banner printed at startup.
pub fn format_arguments(arguments: &[(&'static str, String)]) -> String {
    let mut out = String::from("Input arguments:\n");
    for (key, value) in arguments {
        out.push_str(&format!("{key:16} {value}\n"));
    }
    out
}

/// Train a dual potential and write samples from its gradient map.
pub fn run_dual<B: AutodiffBackend>(args: DualArgs, device: &B::Device) -> anyhow::Result<()> {
    print!("{}", format_arguments(&args.arguments()));
    args.common.log_unused();

    let run = load_or_default(args.common.config.as_deref())?;
    let training = DualTrainingConfig::new()
        .with_epochs(args.epoch)
        .with_batch_count(args.common.n)
        .with_lr(args.common.lr)
        .with_optimizer(args.common.optimizer_choice()?)
        .with_eps(args.common.eps)
        .with_iters(args.common.iters)
        .with_seed(args.common.seed);
    // Reject bad hyperparameters before touching any dataset.
    training.validate()?;

    let target_rows = load_dual_target(&args, &run)?;
    let target = rows_to_tensor::<B>(&target_rows, device)?;

    let model = IcnnConfig::new(args.dims)
        .with_hidden_dim(run.icnn.hidden_dim)
        .with_num_layer(run.icnn.num_layer)
        .with_activation(run.icnn.activation)
        .with_seed(run.icnn.seed)
        .init::<B>(device)?;
    tracing::info!(
        dims = args.dims,
        hidden_dim = run.icnn.hidden_dim,
        num_layer = run.icnn.num_layer,
        activation = %run.icnn.activation,
        target = ?args.target,
        "Built ICNN potential"
    );

    let model = trainer::train(&training, model, target.clone(), device)?;

    let samples = sample_potential(&model, SAMPLE_COUNT, device)?;
    let reference_count = SAMPLE_COUNT.min(target_rows.len());
    let reference = target.inner().slice([0..reference_count, 0..args.dims]);
    let score = mmd(samples.clone(), reference);
    tracing::info!(mmd = score, samples = SAMPLE_COUNT, reference = reference_count, "Sample quality");

    if args.dims == MNIST_DIMS {
        save_flat_grid(samples, [1, MNIST_SIDE, MNIST_SIDE], &args.output)?;
    } else {
        save_json_rows(samples, &json_path(&args.output))?;
    }

    println!("Training completed!");
    Ok(())
}

fn load_dual_target(args: &DualArgs, run: &RunToml) -> anyhow::Result<Vec<Vec<f32>>> {
    match args.target {
        TargetKind::Mnist => {
            if args.dims != MNIST_DIMS {
                anyhow::bail!(
                    "--target mnist needs --dims {MNIST_DIMS}, got {}",
                    args.dims
                );
            }
            Ok(mnist::load_rows(args.common.n)?)
        }
        TargetKind::GaussianMixture => {
            let mixture = run.data.mixture()?;
            let mut rng = args.common.rng();
            Ok(mixture.sample_rows(args.common.n, args.dims, &mut rng))
        }
    }
}

/// `samples.json` in the directory of the image output.
fn json_path(output: &Path) -> PathBuf {
    output.with_file_name("samples.json")
}

/// Train the VAE baseline on CIFAR-10 and write a grid of prior samples.
pub fn run_vae<B: AutodiffBackend>(args: VaeArgs, device: &B::Device) -> anyhow::Result<()> {
    print!("{}", format_arguments(&args.arguments()));
    args.common.log_unused();
    tracing::debug!(
        gaussian_support = args.gaussian_support,
        eps = args.common.eps,
        iters = args.common.iters,
        "VAE flags accepted but unused by training"
    );

    let run = load_or_default(args.common.config.as_deref())?;
    if run.vae.image_size != CIFAR_SIDE || run.vae.channel_num != CIFAR_CHANNELS {
        anyhow::bail!(
            "CIFAR-10 images are {CIFAR_CHANNELS}x{CIFAR_SIDE}x{CIFAR_SIDE}, config asks for {}x{}x{}",
            run.vae.channel_num,
            run.vae.image_size,
            run.vae.image_size
        );
    }
    let training = VaeTrainingConfig::new()
        .with_epochs(args.epoch)
        .with_lr(args.common.lr)
        .with_optimizer(args.common.optimizer_choice()?)
        .with_kl_scale(args.kl_scale)
        .with_batch_size(args.common.batch_size)
        .with_seed(args.common.seed);

    let dataset = Cifar10Dataset::from_dir(&args.data_dir)
        .with_context(|| format!("loading CIFAR-10 from {}", args.data_dir.display()))?;
    let channel_summary = args.gen_theor.then(|| dataset.channel_summary());

    let shuffle_seed = args.common.seed.unwrap_or_else(rand::random);
    let loader = cifar_loader(
        dataset,
        CifarBatcher::<B>::new(device.clone(), run.data.augment),
        args.common.batch_size,
        shuffle_seed,
        run.data.num_workers,
    );

    let model = VaeConfig::new()
        .with_image_size(run.vae.image_size)
        .with_channel_num(run.vae.channel_num)
        .with_kernel_num(run.vae.kernel_num)
        .with_z_size(args.dims)
        .init::<B>(device)?;
    tracing::info!(
        kernel_num = run.vae.kernel_num,
        z_size = args.dims,
        augment = run.data.augment,
        num_workers = run.data.num_workers,
        "Built VAE"
    );

    let model = vae_trainer::train(&training, model, loader.as_ref())?;

    let images = model.valid().sample(SAMPLE_COUNT, device);
    tracing::info!(
        max = tensor_to_f64(images.clone().max()),
        min = tensor_to_f64(images.clone().min()),
        mean = tensor_to_f64(images.clone().mean()),
        "Generated samples"
    );
    save_grid(images, &args.output)?;

    if let Some(summary) = channel_summary {
        for (channel, axis) in summary.iter().enumerate() {
            tracing::info!(channel, mean = axis.mean, std = axis.std, "Target distribution");
        }
    }

    println!("Training completed!");
    Ok(())
}
