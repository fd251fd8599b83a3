use burn::module::{Ignored, Param};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;
use rand::SeedableRng;

use crate::error::{OtError, Result as OtResult};
use crate::model::init::truncated_normal_tensor;
use crate::model::positive_linear::{PositiveLinear, PositiveLinearConfig};
use crate::model::potential::ConvexPotential;

/// Convex, non-decreasing activation applied between ICNN layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// CELU with alpha = 1.
    #[default]
    Celu,
    /// Leaky ReLU with negative slope 0.2.
    LeakyRelu,
    Relu,
    /// Softplus with beta = 1.
    Softplus,
}

impl Activation {
    pub fn apply<B: Backend, const D: usize>(self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            // celu(x) = max(0, x) + min(0, exp(x) - 1)
            Activation::Celu => x.clone().clamp_min(0.0) + x.clamp_max(0.0).exp().sub_scalar(1.0),
            Activation::LeakyRelu => activation::leaky_relu(x, 0.2),
            Activation::Relu => activation::relu(x),
            Activation::Softplus => activation::softplus(x, 1.0),
        }
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Activation::Celu => write!(f, "celu"),
            Activation::LeakyRelu => write!(f, "leaky_relu"),
            Activation::Relu => write!(f, "relu"),
            Activation::Softplus => write!(f, "softplus"),
        }
    }
}

/// Configuration for the last-input-quadratic ICNN potential.
///
/// ```text
/// (batch, input_dim)
///   → act(Linear_0(u))^2
///   → act(PositiveLinear_i(x) + Linear_i(u))      i = 1..num_layer
///   → PositiveLinear_last(x) + Linear_last(u)^2   (no biases)
///   → squeeze → (batch,)
/// ```
#[derive(Config, Debug)]
pub struct IcnnConfig {
    /// Input dimensionality (784 for flattened MNIST).
    pub input_dim: usize,
    /// Width of every hidden layer.
    #[config(default = 1024)]
    pub hidden_dim: usize,
    /// Number of hidden layers; at least 2.
    #[config(default = 3)]
    pub num_layer: usize,
    #[config(default = "Activation::Celu")]
    pub activation: Activation,
    /// Seed for the truncated-normal initialization.
    #[config(default = 0)]
    pub seed: u64,
}

/// Input-convex network acting as a Kantorovich potential.
///
/// The hidden-to-hidden path and the final hidden projection are
/// [`PositiveLinear`] layers: these, and only these, are clamped after each
/// optimizer step.
#[derive(Module, Debug)]
pub struct IcnnPotential<B: Backend> {
    /// Unconstrained input projections, one per hidden layer.
    input_layers: Vec<Linear<B>>,
    /// Positivity-constrained hidden-to-hidden layers (num_layer - 1).
    convex_layers: Vec<PositiveLinear<B>>,
    /// Positivity-constrained hidden → 1 projection.
    last_convex: PositiveLinear<B>,
    /// Unconstrained input → 1 projection, squared in the output.
    last_linear: Linear<B>,
    activation: Ignored<Activation>,
    input_dim: usize,
}

impl IcnnConfig {
    /// Initialize an ICNN with truncated-normal parameters.
    pub fn init<B: Backend>(&self, device: &B::Device) -> OtResult<IcnnPotential<B>> {
        if self.num_layer < 2 {
            return Err(OtError::InvalidConfig(format!(
                "ICNN needs at least 2 layers, got {}",
                self.num_layer
            )));
        }
        if self.input_dim == 0 || self.hidden_dim == 0 {
            return Err(OtError::InvalidConfig(
                "ICNN input_dim and hidden_dim must be positive".to_string(),
            ));
        }

        let mut rng = rand::rngs::StdRng::seed_from_u64(self.seed);

        let input_layers = (0..self.num_layer)
            .map(|_| truncated_linear(self.input_dim, self.hidden_dim, true, &mut rng, device))
            .collect();
        let convex_layers = (1..self.num_layer)
            .map(|_| PositiveLinearConfig::new(self.hidden_dim, self.hidden_dim).init(&mut rng, device))
            .collect();

        Ok(IcnnPotential {
            input_layers,
            convex_layers,
            last_convex: PositiveLinearConfig::new(self.hidden_dim, 1).init(&mut rng, device),
            last_linear: truncated_linear(self.input_dim, 1, false, &mut rng, device),
            activation: Ignored(self.activation),
            input_dim: self.input_dim,
        })
    }
}

/// `Linear` layer with truncated-normal weight (bound `1/sqrt(d_input)`) and
/// bias (bound `1/sqrt(d_output)`).
fn truncated_linear<B: Backend>(
    d_input: usize,
    d_output: usize,
    bias: bool,
    rng: &mut impl rand::Rng,
    device: &B::Device,
) -> Linear<B> {
    let mut linear = LinearConfig::new(d_input, d_output)
        .with_bias(bias)
        .init(device);
    let weight_bound = 1.0 / (d_input as f64).sqrt();
    linear.weight = Param::from_tensor(truncated_normal_tensor(
        [d_input, d_output],
        weight_bound,
        rng,
        device,
    ));
    if bias {
        let bias_bound = 1.0 / (d_output as f64).sqrt();
        linear.bias = Some(Param::from_tensor(truncated_normal_tensor(
            [d_output],
            bias_bound,
            rng,
            device,
        )));
    }
    linear
}

impl<B: Backend> IcnnPotential<B> {
    /// Forward pass.
    ///
    /// Input shape: `(batch, input_dim)`
    /// Output shape: `(batch,)`
    pub fn forward(&self, u: Tensor<B, 2>) -> Tensor<B, 1> {
        let act = self.activation.0;

        let mut x = act.apply(self.input_layers[0].forward(u.clone())).powf_scalar(2.0);
        for (convex, input) in self.convex_layers.iter().zip(&self.input_layers[1..]) {
            x = act.apply(convex.forward(x) + input.forward(u.clone()));
        }

        let quadratic = self.last_linear.forward(u).powf_scalar(2.0);
        let out = self.last_convex.forward(x) + quadratic;
        out.squeeze::<1>(1)
    }

    /// Number of hidden layers.
    pub fn num_layer(&self) -> usize {
        self.input_layers.len()
    }
}

impl<B: Backend> ConvexPotential<B> for IcnnPotential<B> {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn potential(&self, input: Tensor<B, 2>) -> Tensor<B, 1> {
        self.forward(input)
    }

    fn enforce_non_negativity(self) -> Self {
        Self {
            convex_layers: self
                .convex_layers
                .into_iter()
                .map(PositiveLinear::clamp_non_negative)
                .collect(),
            last_convex: self.last_convex.clamp_non_negative(),
            ..self
        }
    }

    fn constrained_weights(&self) -> Vec<Tensor<B, 1>> {
        self.convex_layers
            .iter()
            .chain(std::iter::once(&self.last_convex))
            .map(|layer| layer.weight().flatten::<1>(0, 1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn small_config(input_dim: usize) -> IcnnConfig {
        IcnnConfig::new(input_dim).with_hidden_dim(16)
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = small_config(784).init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 2>::random([8, 784], Distribution::Default, &device);
        assert_eq!(model.forward(input).dims(), [8]);
        assert_eq!(model.input_dim(), 784);
        assert_eq!(model.num_layer(), 3);
    }

    #[test]
    fn test_rejects_single_layer() {
        let device = Default::default();
        let err = small_config(2)
            .with_num_layer(1)
            .init::<TestBackend>(&device)
            .unwrap_err();
        assert!(matches!(err, OtError::InvalidConfig(_)), "got {err}");
    }

    #[test]
    fn test_parameter_count() {
        let device = Default::default();
        let model = IcnnConfig::new(2)
            .with_hidden_dim(4)
            .init::<TestBackend>(&device)
            .unwrap();

        // Input layers: 3 * (2*4 + 4) = 36
        // Convex layers: 2 * (4*4) = 32
        // Last convex: 4
        // Last linear: 2
        assert_eq!(model.num_params(), 74);
    }

    #[test]
    fn test_seed_makes_init_deterministic() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[0.1_f32, 0.2], [0.7, 0.4]]),
            &device,
        );
        let a = small_config(2).with_seed(11).init::<TestBackend>(&device).unwrap();
        let b = small_config(2).with_seed(11).init::<TestBackend>(&device).unwrap();
        let diff: f32 = (a.forward(input.clone()) - b.forward(input))
            .abs()
            .max()
            .into_scalar()
            .elem();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_enforce_non_negativity_clamps_only_constrained_layers() {
        let device = Default::default();
        let model = small_config(3).init::<TestBackend>(&device).unwrap();

        let any_negative_before = model
            .constrained_weights()
            .into_iter()
            .any(|w| w.min().into_scalar().elem::<f32>() < 0.0);
        assert!(any_negative_before, "truncated normal init should produce negative entries");
        let input_weight_before = model.input_layers[0].weight.val();

        let model = model.enforce_non_negativity();
        for w in model.constrained_weights() {
            let min: f32 = w.min().into_scalar().elem();
            assert!(min >= 0.0, "constrained weight has negative entry {min}");
        }

        // Unconstrained input projections are untouched.
        let diff: f32 = (model.input_layers[0].weight.val() - input_weight_before)
            .abs()
            .max()
            .into_scalar()
            .elem();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_convex_along_a_line_after_clamp() {
        // f((a+b)/2) <= (f(a)+f(b))/2 must hold once the hidden path is non-negative.
        // Leaky ReLU keeps the squared first layer convex.
        let device = Default::default();
        let model = small_config(2)
            .with_activation(Activation::LeakyRelu)
            .with_seed(5)
            .init::<TestBackend>(&device)
            .unwrap()
            .enforce_non_negativity();

        let a = Tensor::<TestBackend, 2>::from_data(TensorData::from([[-1.0_f32, 0.5]]), &device);
        let b = Tensor::<TestBackend, 2>::from_data(TensorData::from([[2.0_f32, -1.5]]), &device);
        let mid = (a.clone() + b.clone()).div_scalar(2.0);

        let f_mid: f32 = model.forward(mid).into_scalar().elem();
        let f_avg: f32 = (model.forward(a) + model.forward(b)).div_scalar(2.0).into_scalar().elem();
        assert!(f_mid <= f_avg + 1e-5, "midpoint {f_mid} exceeds chord {f_avg}");
    }

    #[test]
    fn test_gradient_flows_through_all_layers() {
        use burn::optim::GradientsParams;

        let device = Default::default();
        let model = small_config(4)
            .init::<TestAutodiffBackend>(&device)
            .unwrap()
            .enforce_non_negativity();
        let input = Tensor::<TestAutodiffBackend, 2>::random(
            [6, 4],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let loss = model.forward(input).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &model);

        let first = grads
            .get::<NdArray<f32>, 2>(model.input_layers[0].weight.id)
            .expect("first input layer should have gradient");
        assert!(first.abs().sum().into_scalar().elem::<f32>() > 0.0);

        let last = grads
            .get::<NdArray<f32>, 2>(model.last_convex.weight.id)
            .expect("last convex layer should have gradient");
        assert!(last.abs().sum().into_scalar().elem::<f32>() > 0.0);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = IcnnConfig::new(5)
            .with_num_layer(4)
            .with_activation(Activation::Softplus);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"softplus\""), "got {json}");
        let back: IcnnConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.input_dim, 5);
        assert_eq!(back.num_layer, 4);
        assert_eq!(back.activation, Activation::Softplus);
        assert_eq!(back.hidden_dim, 1024);
    }

    #[test]
    fn test_celu_matches_definition() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_data(TensorData::from([-2.0_f32, 0.0, 1.5]), &device);
        let y: Vec<f32> = Activation::Celu.apply(x).into_data().to_vec().unwrap();
        assert!((y[0] - ((-2.0_f32).exp() - 1.0)).abs() < 1e-6);
        assert!(y[1].abs() < 1e-6);
        assert!((y[2] - 1.5).abs() < 1e-6);
    }
}
