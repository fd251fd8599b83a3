//! CIFAR-10 binary-format reader and the training-time batcher.
//!
//! Each record in `data_batch_{1..5}.bin` is one label byte followed by
//! 3072 pixel bytes in channel-major order (1024 red, 1024 green, 1024 blue).

use std::path::Path;
use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::Dataset;
use burn::prelude::*;
use burn::tensor::TensorData;
use rand::Rng;

use crate::data::synthetic::AxisSummary;
use crate::data::ImageBatch;
use crate::error::{OtError, Result};

pub const CIFAR_SIDE: usize = 32;
pub const CIFAR_CHANNELS: usize = 3;
pub const CIFAR_PIXELS: usize = CIFAR_CHANNELS * CIFAR_SIDE * CIFAR_SIDE;
pub const RECORD_BYTES: usize = 1 + CIFAR_PIXELS;

/// Zero padding applied before the random crop.
pub const CROP_PADDING: usize = 4;

const TRAIN_BATCHES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];

/// One CIFAR-10 image with its class label.
#[derive(Clone, Debug)]
pub struct CifarItem {
    /// Raw CHW pixel bytes.
    pub pixels: Vec<u8>,
    pub label: u8,
}

impl CifarItem {
    /// Pixels scaled to `[0, 1]`, CHW order.
    pub fn to_floats(&self) -> Vec<f32> {
        self.pixels.iter().map(|&p| p as f32 / 255.0).collect()
    }
}

/// Parse a buffer of concatenated 3073-byte records.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<CifarItem>> {
    if bytes.len() % RECORD_BYTES != 0 {
        return Err(OtError::Dataset(format!(
            "CIFAR-10 buffer of {} bytes is not a whole number of {RECORD_BYTES}-byte records",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(RECORD_BYTES)
        .map(|record| CifarItem {
            label: record[0],
            pixels: record[1..].to_vec(),
        })
        .collect())
}

/// In-memory CIFAR-10 training split.
#[derive(Debug, Clone)]
pub struct Cifar10Dataset {
    items: Vec<CifarItem>,
}

impl Cifar10Dataset {
    /// Read the five training batches from `dir` (the extracted
    /// `cifar-10-batches-bin` directory).
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut items = Vec::new();
        for name in TRAIN_BATCHES {
            let path = dir.join(name);
            let bytes = std::fs::read(&path).map_err(|e| {
                OtError::Dataset(format!("failed to read {}: {e}", path.display()))
            })?;
            items.extend(parse_records(&bytes)?);
        }
        tracing::info!(dir = %dir.display(), images = items.len(), "Loaded CIFAR-10 training split");
        Ok(Self { items })
    }

    pub fn from_items(items: Vec<CifarItem>) -> Self {
        Self { items }
    }

    /// Per-channel mean and standard deviation of the scaled pixels.
    pub fn channel_summary(&self) -> Vec<AxisSummary> {
        let plane = CIFAR_SIDE * CIFAR_SIDE;
        (0..CIFAR_CHANNELS)
            .map(|c| {
                let values = self.items.iter().flat_map(|item| {
                    item.pixels[c * plane..(c + 1) * plane]
                        .iter()
                        .map(|&p| p as f64 / 255.0)
                });
                AxisSummary::from_values(values)
            })
            .collect()
    }
}

impl Dataset<CifarItem> for Cifar10Dataset {
    fn get(&self, index: usize) -> Option<CifarItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Crop a `CIFAR_SIDE` window out of the zero-padded image at offset
/// `(dy, dx)` in padded coordinates, optionally mirroring it horizontally.
///
/// `pixels` is CHW; offsets range over `0..=2 * CROP_PADDING`.
pub fn crop_and_flip(pixels: &[f32], dy: usize, dx: usize, flip: bool) -> Vec<f32> {
    let side = CIFAR_SIDE as isize;
    let pad = CROP_PADDING as isize;
    let mut out = vec![0.0; CIFAR_PIXELS];

    for c in 0..CIFAR_CHANNELS {
        let plane = c * CIFAR_SIDE * CIFAR_SIDE;
        for y in 0..CIFAR_SIDE {
            let sy = y as isize + dy as isize - pad;
            if !(0..side).contains(&sy) {
                continue;
            }
            for x in 0..CIFAR_SIDE {
                let cx = if flip { CIFAR_SIDE - 1 - x } else { x };
                let sx = cx as isize + dx as isize - pad;
                if !(0..side).contains(&sx) {
                    continue;
                }
                out[plane + y * CIFAR_SIDE + x] =
                    pixels[plane + sy as usize * CIFAR_SIDE + sx as usize];
            }
        }
    }
    out
}

/// Stacks CIFAR items into an [`ImageBatch`], applying random crop and flip
/// when `augment` is set.
#[derive(Clone, Debug)]
pub struct CifarBatcher<B: Backend> {
    device: B::Device,
    augment: bool,
}

impl<B: Backend> CifarBatcher<B> {
    pub fn new(device: B::Device, augment: bool) -> Self {
        Self { device, augment }
    }
}

impl<B: Backend> Batcher<CifarItem, ImageBatch<B>> for CifarBatcher<B> {
    fn batch(&self, items: Vec<CifarItem>) -> ImageBatch<B> {
        let mut rng = rand::thread_rng();
        let count = items.len();
        let mut flat = Vec::with_capacity(count * CIFAR_PIXELS);

        for item in &items {
            let pixels = item.to_floats();
            if self.augment {
                let dy = rng.gen_range(0..=2 * CROP_PADDING);
                let dx = rng.gen_range(0..=2 * CROP_PADDING);
                flat.extend(crop_and_flip(&pixels, dy, dx, rng.gen_bool(0.5)));
            } else {
                flat.extend(pixels);
            }
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(flat, [count, CIFAR_CHANNELS, CIFAR_SIDE, CIFAR_SIDE]),
            &self.device,
        );
        ImageBatch { images }
    }
}

/// Shuffled mini-batch loader over `dataset`.
///
/// `num_workers == 0` keeps loading on the calling thread; burn's
/// multi-threaded loader needs at least one worker.
pub fn cifar_loader<B: Backend>(
    dataset: Cifar10Dataset,
    batcher: CifarBatcher<B>,
    batch_size: usize,
    shuffle_seed: u64,
    num_workers: usize,
) -> Arc<dyn DataLoader<ImageBatch<B>>> {
    let builder = DataLoaderBuilder::new(batcher)
        .batch_size(batch_size)
        .shuffle(shuffle_seed);
    let builder = if num_workers > 0 {
        builder.num_workers(num_workers)
    } else {
        builder
    };
    builder.build(dataset)
}
