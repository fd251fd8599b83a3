//! Synthetic targets and per-axis summaries.

use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{OtError, Result};

/// Mean and standard deviation along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSummary {
    pub mean: f64,
    pub std: f64,
}

impl AxisSummary {
    /// Population mean / std of `values`; zeros when empty.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let (mut count, mut sum, mut sum_sq) = (0usize, 0.0, 0.0);
        for v in values {
            count += 1;
            sum += v;
            sum_sq += v * v;
        }
        if count == 0 {
            return Self { mean: 0.0, std: 0.0 };
        }
        let mean = sum / count as f64;
        let var = (sum_sq / count as f64 - mean * mean).max(0.0);
        Self {
            mean,
            std: var.sqrt(),
        }
    }
}

/// Per-column summary of a set of rows.
pub fn summarize(rows: &[Vec<f32>]) -> Vec<AxisSummary> {
    let dims = rows.first().map_or(0, Vec::len);
    (0..dims)
        .map(|k| AxisSummary::from_values(rows.iter().map(|row| row[k] as f64)))
        .collect()
}

/// One-dimensional Gaussian mixture, sampled independently per coordinate.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    components: Vec<Normal<f64>>,
    selector: WeightedIndex<f64>,
}

impl GaussianMixture {
    /// Weights must be non-negative and sum to 1; every list must have the
    /// same non-zero length and every std must be positive.
    pub fn new(means: &[f64], stds: &[f64], weights: &[f64]) -> Result<Self> {
        if means.is_empty() || means.len() != stds.len() || means.len() != weights.len() {
            return Err(OtError::InvalidConfig(format!(
                "mixture needs equal, non-empty means/stds/weights, got {}/{}/{}",
                means.len(),
                stds.len(),
                weights.len()
            )));
        }
        let total: f64 = weights.iter().sum();
        if weights.iter().any(|&w| w < 0.0) || (total - 1.0).abs() > 1e-6 {
            return Err(OtError::InvalidConfig(format!(
                "mixture weights must be non-negative and sum to 1, got {weights:?}"
            )));
        }

        let components = means
            .iter()
            .zip(stds)
            .map(|(&mean, &std)| {
                if std > 0.0 {
                    Normal::new(mean, std).map_err(|e| OtError::InvalidConfig(e.to_string()))
                } else {
                    Err(OtError::InvalidConfig(format!(
                        "mixture std must be positive, got {std}"
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let selector =
            WeightedIndex::new(weights).map_err(|e| OtError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            components,
            selector,
        })
    }

    /// Draw a single coordinate.
    pub fn sample_value<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.components[self.selector.sample(rng)].sample(rng)
    }

    /// Draw `count` rows of `dims` independent coordinates.
    pub fn sample_rows<R: Rng + ?Sized>(&self, count: usize, dims: usize, rng: &mut R) -> Vec<Vec<f32>> {
        (0..count)
            .map(|_| (0..dims).map(|_| self.sample_value(rng) as f32).collect())
            .collect()
    }
}
