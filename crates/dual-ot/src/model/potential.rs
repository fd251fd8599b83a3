use burn::prelude::*;

/// A scalar potential over `R^d` whose input-gradient is a generative map.
///
/// Implementors declare their positivity-constrained parameters statically:
/// [`ConvexPotential::enforce_non_negativity`] knows exactly which weights to
/// clamp, no parameter inspection at runtime.
pub trait ConvexPotential<B: Backend>: Module<B> {
    /// Input dimensionality `d`.
    fn input_dim(&self) -> usize;

    /// Maps `(batch, d)` inputs to `(batch,)` potential values.
    fn potential(&self, input: Tensor<B, 2>) -> Tensor<B, 1>;

    /// Clamp every positivity-constrained parameter to `>= 0`.
    fn enforce_non_negativity(self) -> Self;

    /// Current values of the positivity-constrained weights, flattened.
    fn constrained_weights(&self) -> Vec<Tensor<B, 1>>;
}
