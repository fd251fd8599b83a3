//! Truncated-normal parameter initialization.

use burn::prelude::*;
use burn::tensor::TensorData;
use rand::Rng;
use rand_distr::StandardNormal;

/// Draw `count` standard-normal samples restricted to `[-threshold, threshold]`.
///
/// Exact rejection sampling: narrow windows propose uniformly inside the
/// window and accept with the normal density ratio `exp(-x^2 / 2)`; wide
/// windows propose from the full normal and reject out-of-range draws.
pub fn truncated_normal(count: usize, threshold: f64, rng: &mut impl Rng) -> Vec<f32> {
    let mut values = Vec::with_capacity(count);
    if threshold <= 0.0 {
        values.resize(count, 0.0);
        return values;
    }
    while values.len() < count {
        let x = if threshold < 2.0 {
            let x = rng.gen_range(-threshold..=threshold);
            if rng.gen::<f64>() > (-0.5 * x * x).exp() {
                continue;
            }
            x
        } else {
            let x: f64 = rng.sample(StandardNormal);
            if x.abs() > threshold {
                continue;
            }
            x
        };
        values.push(x as f32);
    }
    values
}

/// Build a tensor of the given shape filled by [`truncated_normal`].
pub fn truncated_normal_tensor<B: Backend, const D: usize>(
    shape: [usize; D],
    threshold: f64,
    rng: &mut impl Rng,
    device: &B::Device,
) -> Tensor<B, D> {
    let count = shape.iter().product();
    let values = truncated_normal(count, threshold, rng);
    Tensor::from_data(TensorData::new(values, shape), device)
}
