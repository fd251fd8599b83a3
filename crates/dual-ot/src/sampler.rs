//! Sample generation through the input-gradient of a trained potential.
//!
//! Generated samples are `grad_u phi(u)` for uniform noise `u`: one forward
//! pass over the batch, one backward pass on the summed potential, and the
//! gradient w.r.t. the noise is read back. The result lives on the inner
//! (non-autodiff) backend.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Distribution;

use crate::error::{OtError, Result};
use crate::model::potential::ConvexPotential;

/// Gradient of `sum(model.potential(input))` with respect to `input`.
///
/// `input` must carry gradient tracking (`require_grad()`); otherwise the
/// graph holds no gradient for it and this fails with
/// [`OtError::MissingInputGradient`].
pub fn input_gradient<B, M>(model: &M, input: Tensor<B, 2>) -> Result<Tensor<B::InnerBackend, 2>>
where
    B: AutodiffBackend,
    M: ConvexPotential<B>,
{
    let total = model.potential(input.clone()).sum();
    let grads = total.backward();
    input.grad(&grads).ok_or(OtError::MissingInputGradient)
}

/// Draw `count` samples from the generative map of `model`.
pub fn sample_potential<B, M>(
    model: &M,
    count: usize,
    device: &B::Device,
) -> Result<Tensor<B::InnerBackend, 2>>
where
    B: AutodiffBackend,
    M: ConvexPotential<B>,
{
    let noise = Tensor::<B, 2>::random(
        [count, model.input_dim()],
        Distribution::Uniform(0.0, 1.0),
        device,
    )
    .require_grad();

    let samples = input_gradient(model, noise)?;
    tracing::debug!(count, dims = model.input_dim(), "Sampled potential gradient map");
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::icnn::IcnnConfig;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::module::Param;
    use burn::tensor::TensorData;

    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    /// `phi(u) = 0.5 * sum_k w_k u_k^2`, gradient `w * u`.
    #[derive(Module, Debug)]
    struct WeightedQuadratic<B: Backend> {
        weight: Param<Tensor<B, 1>>,
    }

    impl<B: Backend> ConvexPotential<B> for WeightedQuadratic<B> {
        fn input_dim(&self) -> usize {
            self.weight.val().dims()[0]
        }

        fn potential(&self, input: Tensor<B, 2>) -> Tensor<B, 1> {
            let w = self.weight.val().unsqueeze::<2>();
            (input.powf_scalar(2.0) * w).sum_dim(1).squeeze(1).mul_scalar(0.5)
        }

        fn enforce_non_negativity(self) -> Self {
            self
        }

        fn constrained_weights(&self) -> Vec<Tensor<B, 1>> {
            vec![]
        }
    }

    fn quadratic(device: &<TestAutodiffBackend as Backend>::Device) -> WeightedQuadratic<TestAutodiffBackend> {
        WeightedQuadratic {
            weight: Param::from_tensor(Tensor::from_data(TensorData::from([1.0_f32, 3.0]), device)),
        }
    }

    #[test]
    fn test_gradient_matches_analytic() {
        let device = Default::default();
        let model = quadratic(&device);
        let input = Tensor::<TestAutodiffBackend, 2>::from_data(
            TensorData::from([[0.5_f32, 2.0], [-1.0, 0.25]]),
            &device,
        )
        .require_grad();

        let grad: Vec<f32> = input_gradient(&model, input).unwrap().into_data().to_vec().unwrap();
        let expected = [0.5, 6.0, -1.0, 0.75];
        for (g, e) in grad.iter().zip(expected) {
            assert!((g - e).abs() < 1e-6, "gradient {grad:?}, expected {expected:?}");
        }
    }

    #[test]
    fn test_untracked_input_fails() {
        let device = Default::default();
        let model = quadratic(&device);
        let input = Tensor::<TestAutodiffBackend, 2>::ones([3, 2], &device);
        assert!(matches!(
            input_gradient(&model, input),
            Err(OtError::MissingInputGradient)
        ));
    }

    #[test]
    fn test_sample_icnn_shape() {
        let device = Default::default();
        let model = IcnnConfig::new(3)
            .with_hidden_dim(8)
            .init::<TestAutodiffBackend>(&device)
            .unwrap();
        let samples = sample_potential(&model, 5, &device).unwrap();
        assert_eq!(samples.dims(), [5, 3]);

        let values: Vec<f32> = samples.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
    }
}
