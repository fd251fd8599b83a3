mod config;
mod pipeline;

use burn::backend::Autodiff;
use burn::prelude::Backend;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipeline::{DualArgs, VaeArgs};

#[cfg(not(feature = "wgpu"))]
type TrainBackend = Autodiff<burn::backend::NdArray>;
#[cfg(feature = "wgpu")]
type TrainBackend = Autodiff<burn::backend::Wgpu>;

/// ot-gen: generative models from Kantorovich potentials, with a VAE baseline.
#[derive(Parser)]
#[command(name = "ot-gen", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for the two training runs.
#[derive(Subcommand)]
enum Command {
    /// Train an ICNN dual potential against a target set and sample its gradient map.
    Dual(DualArgs),
    /// Train the convolutional VAE baseline on CIFAR-10.
    Vae(VaeArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let device = <TrainBackend as Backend>::Device::default();

    match cli.command {
        Command::Dual(args) => pipeline::run_dual::<TrainBackend>(args, &device),
        Command::Vae(args) => pipeline::run_vae::<TrainBackend>(args, &device),
    }
}
