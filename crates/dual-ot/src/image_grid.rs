//! Output artifacts: sample grids as PNG and low-dimensional samples as JSON.
//!
//! Grid layout follows torchvision's `make_grid`: 8 tiles per row, 2 pixels
//! of zero padding around and between tiles, single-channel tiles replicated
//! to RGB.

use std::path::Path;

use burn::prelude::*;

use crate::error::{OtError, Result};
use crate::model::bridge::{tensor_to_rows, tensor_to_vec};

pub const TILES_PER_ROW: usize = 8;
pub const PADDING: usize = 2;

/// An RGB image in CHW order with values in `[0, 1]` (before clamping).
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    /// `3 * height * width` values, channel-major.
    pub pixels: Vec<f32>,
}

impl Grid {
    /// Value at channel `c`, row `y`, column `x`.
    pub fn at(&self, c: usize, y: usize, x: usize) -> f32 {
        self.pixels[(c * self.height + y) * self.width + x]
    }

    /// Clamp to `[0, 1]` and quantize to interleaved RGB bytes.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let plane = self.width * self.height;
        (0..plane)
            .flat_map(|i| (0..3).map(move |c| i + c * plane))
            .map(|idx| (self.pixels[idx].clamp(0.0, 1.0) * 255.0 + 0.5) as u8)
            .collect()
    }
}

/// Tile `count` images of shape `[channels, h, w]` (flat, CHW each) into a grid.
pub fn make_grid(values: &[f32], count: usize, shape: [usize; 3]) -> Result<Grid> {
    let [channels, h, w] = shape;
    let tile = channels * h * w;
    if count == 0 || tile == 0 || values.len() != count * tile {
        return Err(OtError::InvalidConfig(format!(
            "cannot tile {} values as {count} images of shape {shape:?}",
            values.len()
        )));
    }
    if channels != 1 && channels != 3 {
        return Err(OtError::InvalidConfig(format!(
            "image grid supports 1 or 3 channels, got {channels}"
        )));
    }

    let cols = count.min(TILES_PER_ROW);
    let rows = count.div_ceil(cols);
    let cell_h = h + PADDING;
    let cell_w = w + PADDING;
    let height = rows * cell_h + PADDING;
    let width = cols * cell_w + PADDING;

    let mut pixels = vec![0.0; 3 * height * width];
    for (k, image) in values.chunks_exact(tile).enumerate() {
        let top = (k / cols) * cell_h + PADDING;
        let left = (k % cols) * cell_w + PADDING;
        for c in 0..3 {
            let src = if channels == 1 { 0 } else { c };
            for y in 0..h {
                let src_row = &image[(src * h + y) * w..(src * h + y + 1) * w];
                let dst = (c * height + top + y) * width + left;
                pixels[dst..dst + w].copy_from_slice(src_row);
            }
        }
    }

    Ok(Grid {
        width,
        height,
        pixels,
    })
}

/// Write a batch of images `(count, c, h, w)` as a PNG grid.
pub fn save_grid<B: Backend>(images: Tensor<B, 4>, path: &Path) -> Result<()> {
    let [count, channels, h, w] = images.dims();
    let grid = make_grid(&tensor_to_vec(images)?, count, [channels, h, w])?;

    let buffer = image::RgbImage::from_raw(grid.width as u32, grid.height as u32, grid.to_rgb8())
        .ok_or_else(|| OtError::InvalidConfig("grid buffer does not match its size".to_string()))?;
    buffer.save(path)?;

    tracing::info!(
        path = %path.display(),
        count,
        width = grid.width,
        height = grid.height,
        "Saved sample grid"
    );
    Ok(())
}

/// Write flat samples `(count, c*h*w)` as a PNG grid of `[c, h, w]` images.
pub fn save_flat_grid<B: Backend>(samples: Tensor<B, 2>, shape: [usize; 3], path: &Path) -> Result<()> {
    let [count, dims] = samples.dims();
    if dims != shape.iter().product::<usize>() {
        return Err(OtError::InvalidConfig(format!(
            "sample dimension {dims} does not match image shape {shape:?}"
        )));
    }
    let [c, h, w] = shape;
    save_grid(samples.reshape([count, c, h, w]), path)
}

/// Write samples as a JSON array of rows.
pub fn save_json_rows<B: Backend>(samples: Tensor<B, 2>, path: &Path) -> Result<()> {
    let rows = tensor_to_rows(samples)?;
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    serde_json::to_writer(file, &rows)?;
    tracing::info!(path = %path.display(), count = rows.len(), "Saved samples as JSON");
    Ok(())
}
