//! Image-grid composition for sample previews.
//!
//! A batch of `n` equally sized RGB images is tiled onto a zero-filled canvas.
//! `columns` caps the number of cell bands stacked top to bottom; each band
//! then holds `ceil(n / bands)` cells laid out left to right. Images fill the
//! grid in scan order and unused cells stay black.

use ndarray::{s, Array3, Array4, ArrayView3, ArrayView4, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Layout options for [`compose_grid`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridOptions {
    /// Upper bound on the number of bands stacked vertically.
    #[serde(default = "default_columns")]
    pub columns: usize,
    /// Blank margin added to each cell, in pixels.
    #[serde(default = "default_padding")]
    pub padding: usize,
    /// Reserved. Pixels are never rescaled.
    #[serde(default)]
    pub normalize: bool,
    /// Reserved. Pixels are never rescaled.
    #[serde(default)]
    pub scale_each: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            padding: default_padding(),
            normalize: false,
            scale_each: false,
        }
    }
}

fn default_columns() -> usize {
    8
}

fn default_padding() -> usize {
    2
}

/// Cell geometry derived from the batch shape and options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub bands_down: usize,
    pub cells_across: usize,
    pub cell_height: usize,
    pub cell_width: usize,
    /// Offset of the first cell from the top-left corner.
    pub margin: usize,
}

impl GridLayout {
    pub fn new(count: usize, height: usize, width: usize, options: &GridOptions) -> Result<Self> {
        if count == 0 {
            return Err(Error::invalid_value("cannot compose a grid from zero images"));
        }
        if options.columns == 0 {
            return Err(Error::invalid_value("grid columns must be positive"));
        }
        if options.padding == 0 {
            return Err(Error::invalid_value("grid padding must be positive"));
        }
        let bands_down = options.columns.min(count);
        Ok(Self {
            bands_down,
            cells_across: count.div_ceil(bands_down),
            cell_height: height + options.padding,
            cell_width: width + options.padding,
            margin: 1 + options.padding / 2,
        })
    }

    /// `(height, width, channels)` of the composed canvas.
    pub fn canvas_shape(&self) -> (usize, usize, usize) {
        (
            self.cell_height * self.bands_down + self.margin,
            self.cell_width * self.cells_across + self.margin,
            3,
        )
    }

    /// Top-left pixel of the `index`-th image.
    pub fn origin(&self, index: usize) -> (usize, usize) {
        let band = index / self.cells_across;
        let cell = index % self.cells_across;
        (
            band * self.cell_height + self.margin,
            cell * self.cell_width + self.margin,
        )
    }
}

/// Tile `images` (count × height × width × 3) into one RGB canvas.
pub fn compose_grid(images: ArrayView4<'_, u8>, options: &GridOptions) -> Result<Array3<u8>> {
    let (count, height, width, channels) = images.dim();
    if channels != 3 {
        return Err(Error::shape(format!(
            "expected 3 colour channels, got {channels}"
        )));
    }
    let layout = GridLayout::new(count, height, width, options)?;
    if options.normalize || options.scale_each {
        debug!("normalize/scale_each are reserved and have no effect");
    }

    let mut grid = Array3::<u8>::zeros(layout.canvas_shape());
    for (k, image) in images.outer_iter().enumerate() {
        let (top, left) = layout.origin(k);
        grid.slice_mut(s![top..top + height, left..left + width, ..])
            .assign(&image);
    }

    debug!(
        count,
        bands = layout.bands_down,
        per_band = layout.cells_across,
        shape = ?grid.dim(),
        "Composed image grid"
    );
    Ok(grid)
}

/// Stack separate `height × width × channels` images into a batch.
pub fn stack_images(images: &[ArrayView3<'_, u8>]) -> Result<Array4<u8>> {
    let first = images
        .first()
        .ok_or_else(|| Error::invalid_value("cannot stack zero images"))?;
    if let Some((i, other)) = images
        .iter()
        .enumerate()
        .find(|(_, img)| img.dim() != first.dim())
    {
        return Err(Error::shape(format!(
            "image {i} has shape {:?}, expected {:?}",
            other.dim(),
            first.dim()
        )));
    }
    ndarray::stack(Axis(0), images).map_err(|e| Error::shape(e.to_string()))
}
