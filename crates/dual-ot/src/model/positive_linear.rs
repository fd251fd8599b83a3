use burn::module::Param;
use burn::prelude::*;

use crate::model::init::truncated_normal_tensor;

/// Configuration for a linear layer whose weight must stay non-negative.
#[derive(Config, Debug)]
pub struct PositiveLinearConfig {
    /// Input dimension.
    pub d_input: usize,
    /// Output dimension.
    pub d_output: usize,
}

/// Bias-free linear layer tagged as positivity-constrained.
///
/// Non-negative weights on the hidden path keep the ICNN convex in its
/// input, provided the activations are convex and non-decreasing. The layer
/// itself does not enforce the constraint during the forward pass; the
/// trainer calls [`PositiveLinear::clamp_non_negative`] after every optimizer
/// step.
#[derive(Module, Debug)]
pub struct PositiveLinear<B: Backend> {
    /// Weight matrix, shape (d_output, d_input).
    pub(crate) weight: Param<Tensor<B, 2>>,
}

impl PositiveLinearConfig {
    /// Initialize with a truncated normal in `[-1/sqrt(d_input), 1/sqrt(d_input)]`.
    ///
    /// Negative entries are allowed at init; the first clamp after the first
    /// step removes them.
    pub fn init<B: Backend>(&self, rng: &mut impl rand::Rng, device: &B::Device) -> PositiveLinear<B> {
        let threshold = 1.0 / (self.d_input as f64).sqrt();
        let weight = truncated_normal_tensor::<B, 2>([self.d_output, self.d_input], threshold, rng, device);
        PositiveLinear {
            weight: Param::from_tensor(weight),
        }
    }
}

impl<B: Backend> PositiveLinear<B> {
    /// Computes `input @ W^T`.
    ///
    /// Input shape: `(batch, d_input)`, output shape: `(batch, d_output)`.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        input.matmul(self.weight.val().transpose())
    }

    /// Replace the weight by `relu(weight)`.
    ///
    /// The parameter id is preserved so optimizer state stays attached, and
    /// the clamped value is detached into a fresh leaf that tracks gradients.
    pub fn clamp_non_negative(self) -> Self {
        Self {
            weight: self
                .weight
                .map(|w| w.clamp_min(0.0).detach().require_grad()),
        }
    }

    /// Current weight value, shape (d_output, d_input).
    pub fn weight(&self) -> Tensor<B, 2> {
        self.weight.val()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::{Distribution, TensorData};
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let layer = PositiveLinearConfig::new(16, 8).init::<TestBackend>(&mut rng(), &device);
        let input = Tensor::<TestBackend, 2>::random([4, 16], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(layer.forward(input).dims(), [4, 8]);
    }

    #[test]
    fn test_init_within_threshold() {
        let device = Default::default();
        let layer = PositiveLinearConfig::new(64, 32).init::<TestBackend>(&mut rng(), &device);
        let max_abs: f32 = layer.weight().abs().max().into_scalar().elem();
        assert!(max_abs <= 1.0 / 8.0 + 1e-6, "weight {max_abs} outside truncation bound");
    }

    #[test]
    fn test_clamp_keeps_id_and_zeroes_negatives() {
        let device = Default::default();
        let mut layer = PositiveLinearConfig::new(2, 2).init::<TestBackend>(&mut rng(), &device);
        layer.weight = Param::from_tensor(Tensor::from_data(
            TensorData::from([[-1.0_f32, 2.0], [0.5, -0.25]]),
            &device,
        ));
        let id = layer.weight.id;

        let clamped = layer.clamp_non_negative();
        assert_eq!(clamped.weight.id, id);
        let values: Vec<f32> = clamped.weight().into_data().to_vec().unwrap();
        assert_eq!(values, vec![0.0, 2.0, 0.5, 0.0]);
    }

    #[test]
    fn test_gradient_flows_after_clamp() {
        use burn::optim::GradientsParams;

        let device = Default::default();
        let layer = PositiveLinearConfig::new(4, 3)
            .init::<TestAutodiffBackend>(&mut rng(), &device)
            .clamp_non_negative();
        let input = Tensor::<TestAutodiffBackend, 2>::ones([2, 4], &device);
        let loss = layer.forward(input).sum();

        let grads = GradientsParams::from_grads(loss.backward(), &layer);
        let grad = grads
            .get::<NdArray<f32>, 2>(layer.weight.id)
            .expect("clamped weight should still receive a gradient");
        let grad_sum: f32 = grad.abs().sum().into_scalar().elem();
        assert!(grad_sum > 0.0, "gradient vanished after clamping");
    }
}
