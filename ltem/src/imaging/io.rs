//! Frame loading and saving.

use std::mem::size_of;
use std::path::Path;

use common::file_format::get_file_extension;
use common::Grid;
use image::{GrayImage, ImageFormat};

use crate::config::{PicFormat, PicScaling};
use crate::error::{Error, Result};

const PIC_EXTENSION: &str = "pic";

pub fn is_pic_path(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| ext.eq_ignore_ascii_case(PIC_EXTENSION))
        .unwrap_or(false)
}

/// Decodes a standard image file and converts it to 8-bit luma.
pub fn load_image(path: &Path) -> Result<Grid<u8>> {
    let decoded = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let gray = decoded.to_luma8();
    let (cols, rows) = gray.dimensions();

    tracing::debug!(path = %path.display(), rows, cols, "Image loaded");

    Ok(Grid::new(rows as usize, cols as usize, gray.into_raw()))
}

/// Reads a raw `.pic` frame: `header_bytes` of header, then `rows * cols`
/// little-endian `f32` samples. Samples are clipped to `cutoff`, scaled onto
/// `[0, 255]` according to `scaling` and rounded.
pub fn load_pic(path: &Path, format: &PicFormat) -> Result<Grid<u8>> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let pixel_count = format.rows * format.cols;
    let expected = format.header_bytes + pixel_count * size_of::<f32>();
    if bytes.len() < expected {
        return Err(Error::TruncatedPic {
            path: path.to_path_buf(),
            expected,
            actual: bytes.len(),
        });
    }

    let samples: Vec<f32> = bytes[format.header_bytes..expected]
        .chunks_exact(size_of::<f32>())
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .map(|sample| sample.min(format.cutoff))
        .collect();

    let divisor = match format.scaling {
        PicScaling::Cutoff => format.cutoff,
        PicScaling::FrameMax => samples.iter().copied().fold(0.0, f32::max),
    };

    // A frame with no positive sample stays black.
    let cells = if divisor > 0.0 {
        let scale = 255.0 / divisor;
        // Saturating cast: negative samples land on 0.
        samples.iter().map(|&s| (s * scale).round() as u8).collect()
    } else {
        vec![0; pixel_count]
    };

    tracing::debug!(
        path = %path.display(),
        rows = format.rows,
        cols = format.cols,
        scaling = ?format.scaling,
        "Pic frame loaded"
    );

    Ok(Grid::new(format.rows, format.cols, cells))
}

/// Loads either a `.pic` frame (which needs `pic`) or a standard image.
pub fn load_frame(path: &Path, pic: Option<&PicFormat>) -> Result<Grid<u8>> {
    if is_pic_path(path) {
        let format = pic.ok_or_else(|| Error::PicFormatRequired(path.to_path_buf()))?;
        load_pic(path, format)
    } else {
        load_image(path)
    }
}

pub fn save_gray_png(grid: &Grid<u8>, path: &Path) -> Result<()> {
    let invalid = || Error::InvalidDimensions {
        rows: grid.rows(),
        cols: grid.cols(),
    };
    let width = u32::try_from(grid.cols()).map_err(|_| invalid())?;
    let height = u32::try_from(grid.rows()).map_err(|_| invalid())?;
    let image =
        GrayImage::from_raw(width, height, grid.cells().to_vec()).ok_or_else(invalid)?;

    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| Error::ImageSave {
            path: path.to_path_buf(),
            source,
        })
}
