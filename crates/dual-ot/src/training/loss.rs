//! Dual (semi-discrete Kantorovich) objective and VAE evidence-lower-bound terms.
//!
//! All functions are generic over `B: Backend` and operate on burn tensors.
//! Scalar results are returned as shape `[1]` tensors.

use burn::prelude::*;

/// Semi-dual Kantorovich objective for quadratic-cost transport.
///
/// ```text
/// psi[j, i] = <Y[:, j], U[i]> - y_hat[i]
/// loss      = mean(y_hat) + mean_j max_i psi[j, i]
///           + eps * mean(exp((psi - sup) / eps))     only when eps > 0
/// ```
///
/// # Arguments
/// - `source`: shape `(n, d)`, source samples `U`
/// - `y_hat`: shape `(n,)`, potential values at the source samples
/// - `target`: shape `(d, m)`, target samples as columns
/// - `eps`: entropic smoothing, `0.0` omits the term entirely
///
/// # Returns
/// Scalar loss tensor of shape `(1,)`.
pub fn dual_objective<B: Backend>(
    source: Tensor<B, 2>,
    y_hat: Tensor<B, 1>,
    target: Tensor<B, 2>,
    eps: f64,
) -> Tensor<B, 1> {
    let [n] = y_hat.dims();
    let base = y_hat.clone().mean();

    // (m, d) @ (d, n) - (1, n) broadcast over rows; one row per target sample,
    // so the max runs over the last dimension
    let psi = target.transpose().matmul(source.transpose()) - y_hat.reshape([1, n]);
    let sup = psi.clone().max_dim(1); // (m, 1)
    let loss = base + sup.clone().mean();

    if eps == 0.0 {
        return loss;
    }

    let smoothing = (psi - sup).div_scalar(eps).exp().mean().mul_scalar(eps);
    loss + smoothing
}

/// Reparameterized latent sample: `mean + exp(0.5 * logvar) * noise`.
pub fn reparameterize<B: Backend, const D: usize>(
    mean: Tensor<B, D>,
    logvar: Tensor<B, D>,
    noise: Tensor<B, D>,
) -> Tensor<B, D> {
    mean + logvar.mul_scalar(0.5).exp() * noise
}

/// Summed binary cross-entropy between a reconstruction in `[0, 1]` and its target.
///
/// Log terms are clamped at `-100` so saturated pixels give a finite loss.
pub fn bce_sum<B: Backend, const D: usize>(
    reconstruction: Tensor<B, D>,
    target: Tensor<B, D>,
) -> Tensor<B, 1> {
    let log_p = reconstruction.clone().log().clamp_min(-100.0);
    let log_not_p = reconstruction.neg().add_scalar(1.0).log().clamp_min(-100.0);
    let bce = target.clone() * log_p + target.neg().add_scalar(1.0) * log_not_p;
    bce.sum().neg()
}

/// KL divergence between `N(mean, exp(logvar))` and the standard normal prior,
/// summed over batch and latent dimensions:
/// `-0.5 * sum(1 + logvar - mean^2 - exp(logvar))`.
pub fn kl_divergence<B: Backend>(mean: Tensor<B, 2>, logvar: Tensor<B, 2>) -> Tensor<B, 1> {
    let inner = logvar.clone().add_scalar(1.0) - mean.powf_scalar(2.0) - logvar.exp();
    inner.sum().mul_scalar(-0.5)
}

/// Beta-VAE loss: summed BCE reconstruction + `kl_scale` * KL divergence.
pub fn vae_loss<B: Backend>(
    reconstruction: Tensor<B, 4>,
    images: Tensor<B, 4>,
    mean: Tensor<B, 2>,
    logvar: Tensor<B, 2>,
    kl_scale: f64,
) -> Tensor<B, 1> {
    bce_sum(reconstruction, images) + kl_divergence(mean, logvar).mul_scalar(kl_scale)
}
