//! Loss bookkeeping for the training loops and the MMD sample-quality report.

use burn::prelude::*;

use crate::error::{OtError, Result};

/// Number of loss reports spread over a dual training run.
pub const REPORTS_PER_RUN: usize = 50;

/// Running sum of step losses over a reporting window.
#[derive(Debug, Clone, Default)]
pub struct RunningLoss {
    sum: f64,
    count: usize,
}

impl RunningLoss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, loss: f64) {
        self.sum += loss;
        self.count += 1;
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean over the recorded steps, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Reporting cadence of the dual trainer: every `epochs / 50` epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintCadence(usize);

impl PrintCadence {
    /// Fails with [`OtError::PrintCadence`] when `epochs < 50`, where the
    /// integer division yields a zero interval.
    pub fn for_epochs(epochs: usize) -> Result<Self> {
        match epochs / REPORTS_PER_RUN {
            0 => Err(OtError::PrintCadence { epochs }),
            every => Ok(Self(every)),
        }
    }

    pub fn every(&self) -> usize {
        self.0
    }

    /// Whether the 1-based `epoch` is a reporting epoch.
    pub fn is_due(&self, epoch: usize) -> bool {
        epoch % self.0 == 0
    }
}

/// Gaussian kernel matrix `k(a_i, b_j) = exp(-mean_k (a_ik - b_jk)^2 / d)`.
///
/// `a`: `(n, d)`, `b`: `(m, d)` → `(n, m)`.
pub fn gaussian_kernel<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 2> {
    let [n, d] = a.dims();
    let [m, _] = b.dims();
    let a = a.reshape([n, 1, d]).expand([n, m, d]);
    let b = b.reshape([1, m, d]).expand([n, m, d]);
    let sq: Tensor<B, 2> = (a - b).powf_scalar(2.0).mean_dim(2).squeeze(2);
    sq.div_scalar(d as f64).neg().exp()
}

/// Maximum mean discrepancy between two sample sets under [`gaussian_kernel`].
pub fn mmd<B: Backend>(a: Tensor<B, 2>, b: Tensor<B, 2>) -> f64 {
    let aa: f64 = gaussian_kernel(a.clone(), a.clone()).mean().into_scalar().elem();
    let bb: f64 = gaussian_kernel(b.clone(), b.clone()).mean().into_scalar().elem();
    let ab: f64 = gaussian_kernel(a, b).mean().into_scalar().elem();
    aa + bb - 2.0 * ab
}
