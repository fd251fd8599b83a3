//! Optimizer selection: a closed set of optimizer kinds, each with its own
//! settings, plus a rectified Adam implemented on burn's `SimpleOptimizer`.

use std::str::FromStr;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{AdamConfig, Optimizer, SgdConfig, SimpleOptimizer};
use burn::prelude::*;
use burn::record::Record;
use burn::tensor::backend::AutodiffBackend;
use burn::LearningRate;

use crate::error::OtError;

/// SGD with optional (Nesterov) momentum.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SgdSettings {
    pub momentum: f64,
    pub nesterov: bool,
}

/// Exponential decay rates shared by Adam and RAdam.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AdamSettings {
    pub beta_1: f32,
    pub beta_2: f32,
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
}

fn default_epsilon() -> f32 {
    1e-8
}

/// The supported optimizer kinds.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerChoice {
    Sgd(SgdSettings),
    Adam(AdamSettings),
    #[serde(rename = "radam")]
    RAdam(AdamSettings),
}

impl Default for OptimizerChoice {
    fn default() -> Self {
        OptimizerChoice::Adam(AdamSettings {
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: default_epsilon(),
        })
    }
}

/// Optimizer name as given on the command line, before its coefficients are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Sgd,
    Adam,
    RAdam,
}

impl FromStr for OptimizerKind {
    type Err = OtError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adam" => Ok(OptimizerKind::Adam),
            "radam" => Ok(OptimizerKind::RAdam),
            _ => Err(OtError::InvalidOptimizer(name.to_string())),
        }
    }
}

impl std::fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizerKind::Sgd => write!(f, "sgd"),
            OptimizerKind::Adam => write!(f, "adam"),
            OptimizerKind::RAdam => write!(f, "radam"),
        }
    }
}

impl OptimizerChoice {
    /// Build a choice from the flat CLI coefficients.
    ///
    /// `beta1` doubles as the SGD momentum, as in the command-line interface.
    pub fn from_flags(kind: OptimizerKind, beta1: f64, beta2: f64, nesterov: bool) -> Self {
        let adam = AdamSettings {
            beta_1: beta1 as f32,
            beta_2: beta2 as f32,
            epsilon: default_epsilon(),
        };
        match kind {
            OptimizerKind::Sgd => OptimizerChoice::Sgd(SgdSettings {
                momentum: beta1,
                nesterov,
            }),
            OptimizerKind::Adam => OptimizerChoice::Adam(adam),
            OptimizerKind::RAdam => OptimizerChoice::RAdam(adam),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        match self {
            OptimizerChoice::Sgd(_) => OptimizerKind::Sgd,
            OptimizerChoice::Adam(_) => OptimizerKind::Adam,
            OptimizerChoice::RAdam(_) => OptimizerKind::RAdam,
        }
    }
}

impl SgdSettings {
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> impl Optimizer<M, B> {
        let momentum = (self.momentum > 0.0).then(|| {
            MomentumConfig::new()
                .with_momentum(self.momentum)
                .with_dampening(0.0)
                .with_nesterov(self.nesterov)
        });
        SgdConfig::new().with_momentum(momentum).init()
    }
}

impl AdamSettings {
    pub fn init_adam<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> impl Optimizer<M, B> {
        AdamConfig::new()
            .with_beta_1(self.beta_1)
            .with_beta_2(self.beta_2)
            .with_epsilon(self.epsilon)
            .init()
    }

    pub fn init_radam<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> impl Optimizer<M, B> {
        OptimizerAdaptor::from(RAdam {
            beta_1: self.beta_1,
            beta_2: self.beta_2,
            epsilon: self.epsilon,
        })
    }
}

/// Length of the approximated simple moving average from which the adaptive
/// step is rectified.
const RECTIFY_MIN_SMA: f64 = 5.0;

/// Rectified Adam (Liu et al., 2020).
///
/// Falls back to un-normalized momentum SGD while the variance of the
/// adaptive learning rate is intractable (`rho_t < 5`), and applies the
/// rectification term `r_t` afterwards.
#[derive(Debug, Clone)]
pub struct RAdam {
    beta_1: f32,
    beta_2: f32,
    epsilon: f32,
}

/// Per-parameter RAdam state.
#[derive(Record, Clone)]
pub struct RAdamState<B: Backend, const D: usize> {
    pub moment_1: Tensor<B, D>,
    pub moment_2: Tensor<B, D>,
    pub time: usize,
}

impl RAdam {
    /// Step size multiplier for step `time` (1-based), excluding `lr`.
    ///
    /// Returns `(scale, adaptive)`: when `adaptive` is false the update is
    /// `scale * m_hat`, otherwise `scale * m_hat / (sqrt(v_hat) + eps)`.
    fn step_scale(&self, time: usize) -> (f64, bool) {
        let beta_1 = self.beta_1 as f64;
        let beta_2 = self.beta_2 as f64;
        let t = time as i32;

        let bias_1 = 1.0 - beta_1.powi(t);
        let beta_2_t = beta_2.powi(t);
        let rho_inf = 2.0 / (1.0 - beta_2) - 1.0;
        let rho_t = rho_inf - 2.0 * time as f64 * beta_2_t / (1.0 - beta_2_t);

        if rho_t >= RECTIFY_MIN_SMA {
            let rect = ((rho_t - 4.0) * (rho_t - 2.0) * rho_inf
                / ((rho_inf - 4.0) * (rho_inf - 2.0) * rho_t))
                .sqrt();
            let bias_2 = 1.0 - beta_2_t;
            (rect * bias_2.sqrt() / bias_1, true)
        } else {
            (1.0 / bias_1, false)
        }
    }
}

impl<B: Backend> SimpleOptimizer<B> for RAdam {
    type State<const D: usize> = RAdamState<B, D>;

    fn step<const D: usize>(
        &self,
        lr: LearningRate,
        tensor: Tensor<B, D>,
        grad: Tensor<B, D>,
        state: Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let beta_1 = self.beta_1 as f64;
        let beta_2 = self.beta_2 as f64;

        let (moment_1, moment_2, time) = match state {
            Some(state) => (
                state.moment_1.mul_scalar(beta_1) + grad.clone().mul_scalar(1.0 - beta_1),
                state.moment_2.mul_scalar(beta_2) + grad.powf_scalar(2.0).mul_scalar(1.0 - beta_2),
                state.time + 1,
            ),
            None => (
                grad.clone().mul_scalar(1.0 - beta_1),
                grad.powf_scalar(2.0).mul_scalar(1.0 - beta_2),
                1,
            ),
        };

        let (scale, adaptive) = self.step_scale(time);
        let update = if adaptive {
            // v is bias-corrected through `scale`, so eps is added to sqrt(v) directly.
            moment_1.clone() / moment_2.clone().sqrt().add_scalar(self.epsilon as f64)
        } else {
            moment_1.clone()
        };
        let tensor = tensor - update.mul_scalar(lr * scale);

        (
            tensor,
            Some(RAdamState {
                moment_1,
                moment_2,
                time,
            }),
        )
    }

    fn to_device<const D: usize>(mut state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        state.moment_1 = state.moment_1.to_device(device);
        state.moment_2 = state.moment_2.to_device(device);
        state
    }
}
