//! MNIST training images as flat rows.

use burn::data::dataset::vision::{MnistDataset, MnistItem};
use burn::data::dataset::Dataset;

use crate::error::{OtError, Result};

/// Side length of an MNIST digit.
pub const MNIST_SIDE: usize = 28;

/// Flattened MNIST dimensionality.
pub const MNIST_DIMS: usize = MNIST_SIDE * MNIST_SIDE;

/// Row-major flattening of one digit, pixels scaled from `0..=255` to `[0, 1]`.
pub fn flatten(item: &MnistItem) -> Vec<f32> {
    item.image
        .iter()
        .flat_map(|row| row.iter().map(|&p| p / 255.0))
        .collect()
}

/// First `count` images of the MNIST training split, each flattened to 784 values.
///
/// burn downloads and caches the dataset on first use.
pub fn load_rows(count: usize) -> Result<Vec<Vec<f32>>> {
    let dataset = MnistDataset::train();
    if count > dataset.len() {
        return Err(OtError::Dataset(format!(
            "requested {count} MNIST images, training split has {}",
            dataset.len()
        )));
    }

    let rows = (0..count)
        .map(|i| {
            dataset
                .get(i)
                .map(|item| flatten(&item))
                .ok_or_else(|| OtError::Dataset(format!("MNIST image {i} is missing")))
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(count = rows.len(), dims = MNIST_DIMS, "Loaded MNIST target rows");
    Ok(rows)
}
