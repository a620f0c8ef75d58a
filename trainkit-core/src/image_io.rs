//! Writing composed grids to disk.
//!
//! The encoding is picked from the file extension (`.png`, `.jpg`/`.jpeg`).
//! Parent directories are not created; a missing directory is an error.

use std::path::Path;

use image::RgbImage;
use ndarray::{Array3, ArrayView4};
use tracing::info;

use crate::error::{Error, Result};
use crate::grid::{compose_grid, GridOptions};

/// Encode an RGB grid (`height × width × 3`) to `path`.
pub fn save_grid(grid: &Array3<u8>, path: &Path) -> Result<()> {
    let (height, width, channels) = grid.dim();
    if channels != 3 {
        return Err(Error::shape(format!(
            "expected 3 colour channels, got {channels}"
        )));
    }
    let width_px = to_u32(width, "width")?;
    let height_px = to_u32(height, "height")?;
    let pixels: Vec<u8> = grid.iter().copied().collect();
    let buffer = RgbImage::from_raw(width_px, height_px, pixels)
        .ok_or_else(|| Error::shape("pixel buffer does not match grid dimensions"))?;
    buffer.save(path)?;
    info!(path = %path.display(), width, height, "Saved image grid");
    Ok(())
}

/// Compose `images` into a grid and write it to `path`.
pub fn save_images(
    images: ArrayView4<'_, u8>,
    path: &Path,
    options: &GridOptions,
) -> Result<Array3<u8>> {
    let grid = compose_grid(images, options)?;
    save_grid(&grid, path)?;
    Ok(grid)
}

/// Read an image back as an RGB array.
pub fn load_grid(path: &Path) -> Result<Array3<u8>> {
    let rgb = image::open(path)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Array3::from_shape_vec((height as usize, width as usize, 3), rgb.into_raw())
        .map_err(|e| Error::shape(e.to_string()))
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::invalid_value(format!("grid {what} {value} exceeds image limits")))
}
