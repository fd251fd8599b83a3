//! Tensor bridge: conversions between host-side rows (`Vec<f32>`) and burn
//! tensors, used by the data loaders and the sample writers.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::error::{OtError, Result};

/// Convert a batch of equal-length rows to a burn 2D tensor `(rows, dim)`.
pub fn rows_to_tensor<B: Backend>(rows: &[Vec<f32>], device: &B::Device) -> Result<Tensor<B, 2>> {
    let Some(first) = rows.first() else {
        return Err(OtError::InvalidConfig("rows must not be empty".to_string()));
    };
    let dim = first.len();
    if dim == 0 {
        return Err(OtError::InvalidConfig("row dimension must be > 0".to_string()));
    }
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
        return Err(OtError::InvalidConfig(format!(
            "row {i} has length {}, expected {dim}",
            row.len()
        )));
    }

    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Ok(Tensor::from_data(TensorData::new(flat, [rows.len(), dim]), device))
}

/// Extract the rows of a 2D tensor as `Vec<f32>`s.
pub fn tensor_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<Vec<f32>>> {
    let [_, dim] = tensor.dims();
    Ok(tensor_to_vec(tensor)?
        .chunks(dim.max(1))
        .map(<[f32]>::to_vec)
        .collect())
}

/// Flatten any tensor into host `f32` values.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    data_to_vec(tensor.into_data())
}

fn data_to_vec(data: TensorData) -> Result<Vec<f32>> {
    data.convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| OtError::TensorData(format!("{e:?}")))
}

/// Extract a single f64 scalar from a one-element tensor.
pub fn tensor_to_f64<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_rows_roundtrip_layout() {
        let device = Default::default();
        let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let tensor = rows_to_tensor::<TestBackend>(&rows, &device).unwrap();
        assert_eq!(tensor.dims(), [2, 3]);
        let col_sum: Vec<f32> = tensor_to_vec(tensor.clone().sum_dim(0)).unwrap();
        assert_eq!(col_sum, vec![5.0, 7.0, 9.0]);
        assert_eq!(tensor_to_rows(tensor).unwrap(), rows);
    }

    #[test]
    fn test_unreadable_data_is_an_error() {
        // declared shape promises 4 values, the buffer holds 2 bytes
        let data = TensorData::from_bytes(vec![0u8, 1], [4], burn::tensor::DType::F32);
        assert!(matches!(data_to_vec(data), Err(OtError::TensorData(_))));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let device = Default::default();
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        let err = rows_to_tensor::<TestBackend>(&rows, &device).unwrap_err();
        assert!(err.to_string().contains("row 1 has length 1"), "got {err}");
    }

    #[test]
    fn test_rejects_empty() {
        let device = Default::default();
        assert!(rows_to_tensor::<TestBackend>(&[], &device).is_err());
    }
}
