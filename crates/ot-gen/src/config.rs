//! TOML config loading for the training CLI.
//!
//! An optional run file with `[icnn]`, `[vae]` and `[data]` sections.
//! Every section and every field falls back to its default when missing;
//! command-line flags supply the remaining hyperparameters.

use std::path::Path;

use dual_ot::data::synthetic::GaussianMixture;
use dual_ot::Activation;
use serde::Deserialize;

/// Top-level structure of a run config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunToml {
    #[serde(default)]
    pub icnn: IcnnSection,
    #[serde(default)]
    pub vae: VaeSection,
    #[serde(default)]
    pub data: DataSection,
}

/// ICNN architecture.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IcnnSection {
    pub hidden_dim: usize,
    pub num_layer: usize,
    pub activation: Activation,
    /// Seed for the truncated-normal initialization.
    pub seed: u64,
}

impl Default for IcnnSection {
    fn default() -> Self {
        Self {
            hidden_dim: 1024,
            num_layer: 3,
            activation: Activation::Celu,
            seed: 0,
        }
    }
}

/// VAE architecture. The latent size comes from `--dims`.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaeSection {
    pub image_size: usize,
    pub channel_num: usize,
    pub kernel_num: usize,
}

impl Default for VaeSection {
    fn default() -> Self {
        Self {
            image_size: 32,
            channel_num: 3,
            kernel_num: 128,
        }
    }
}

/// Data loading and the synthetic mixture target.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataSection {
    /// DataLoader worker threads (0 = load on the training thread).
    pub num_workers: usize,
    /// Random crop and horizontal flip on CIFAR-10 batches.
    pub augment: bool,
    pub mixture_means: Vec<f64>,
    pub mixture_stds: Vec<f64>,
    pub mixture_weights: Vec<f64>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            num_workers: 0,
            augment: true,
            mixture_means: vec![-2.0, 2.0],
            mixture_stds: vec![0.5, 0.5],
            mixture_weights: vec![0.5, 0.5],
        }
    }
}

impl DataSection {
    pub fn mixture(&self) -> dual_ot::Result<GaussianMixture> {
        GaussianMixture::new(&self.mixture_means, &self.mixture_stds, &self.mixture_weights)
    }
}

/// Load and deserialize a `RunToml` from a TOML file.
pub fn load_run_toml(path: &Path) -> anyhow::Result<RunToml> {
    let contents = std::fs::read_to_string(path)?;
    let config: RunToml = toml::from_str(&contents)?;
    tracing::info!(path = %path.display(), ?config, "Loaded run config");
    Ok(config)
}

/// Load the config file when one is given, defaults otherwise.
pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<RunToml> {
    match path {
        Some(path) => load_run_toml(path),
        None => Ok(RunToml::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_deserialize_full_run_toml() {
        let toml_str = r#"
[icnn]
hidden_dim = 512
num_layer = 4
activation = "leaky_relu"
seed = 9

[vae]
image_size = 64
channel_num = 1
kernel_num = 32

[data]
num_workers = 2
augment = false
mixture_means = [0.0, 5.0, 10.0]
mixture_stds = [1.0, 1.0, 2.0]
mixture_weights = [0.2, 0.3, 0.5]
"#;
        let config: RunToml = toml::from_str(toml_str).unwrap();
        assert_eq!(config.icnn.hidden_dim, 512);
        assert_eq!(config.icnn.num_layer, 4);
        assert_eq!(config.icnn.activation, Activation::LeakyRelu);
        assert_eq!(config.icnn.seed, 9);
        assert_eq!(config.vae.image_size, 64);
        assert_eq!(config.vae.channel_num, 1);
        assert_eq!(config.data.num_workers, 2);
        assert!(!config.data.augment);
        assert!(config.data.mixture().is_ok());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: RunToml = toml::from_str("[icnn]\nhidden_dim = 64\n").unwrap();
        assert_eq!(config.icnn.hidden_dim, 64);
        assert_eq!(config.icnn.num_layer, 3);
        assert_eq!(config.icnn.activation, Activation::Celu);
        assert_eq!(config.vae.kernel_num, 128);
        assert_eq!(config.data.num_workers, 0);
        assert!(config.data.augment);
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(toml::from_str::<RunToml>("[icnn]\nwidth = 3\n").is_err());
        assert!(toml::from_str::<RunToml>("[optimizer]\nlr = 0.1\n").is_err());
    }

    #[test]
    fn test_bad_mixture_weights_fail_on_use() {
        let config: RunToml = toml::from_str(
            "[data]\nmixture_means = [0.0, 1.0]\nmixture_stds = [1.0, 1.0]\nmixture_weights = [0.6, 0.6]\n",
        )
        .unwrap();
        assert!(matches!(
            config.data.mixture(),
            Err(dual_ot::OtError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[vae]\nkernel_num = 16").unwrap();
        let config = load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.vae.kernel_num, 16);

        let defaults = load_or_default(None).unwrap();
        assert_eq!(defaults.icnn.hidden_dim, 1024);
    }
}
