//! Separable Gaussian blur with a square, odd-sized window.

use common::Grid;
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Rows handed to one rayon task per pass.
const ROWS_PER_CHUNK: usize = 8;

/// Bumps an even window length to the next odd one.
#[inline]
pub fn odd_window(length: usize) -> usize {
    if length % 2 == 0 {
        length + 1
    } else {
        length
    }
}

/// Sigma used for a window of `window` pixels when none is given explicitly.
///
/// Same rule as OpenCV's `getGaussianKernel`: `0.3 * ((k - 1) / 2 - 1) + 0.8`.
#[inline]
pub fn window_sigma(window: usize) -> f32 {
    0.3 * ((window as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian kernel of length `window`.
pub fn gaussian_kernel_1d(window: usize, sigma: f32) -> Vec<f32> {
    debug_assert!(window % 2 == 1);

    let radius = (window / 2) as f32;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..window)
        .map(|i| {
            let x = i as f32 - radius;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Blurs `image` with a `window x window` Gaussian. Borders are reflected
/// without repeating the edge pixel (`dcb|abcd|cba`).
pub fn gaussian_blur(image: &Grid<u8>, window: usize) -> Result<Grid<u8>> {
    if window == 0 || window % 2 == 0 {
        return Err(Error::InvalidKernel(window));
    }
    if window == 1 || image.is_empty() {
        return Ok(image.clone());
    }

    let (rows, cols) = image.shape();
    let kernel = gaussian_kernel_1d(window, window_sigma(window));
    let radius = window / 2;
    let input: Vec<f32> = image.iter().map(|&v| f32::from(v)).collect();

    // Horizontal pass
    let mut temp = vec![0.0f32; rows * cols];
    temp.par_chunks_mut(cols * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out_chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out_chunk.chunks_mut(cols).enumerate() {
                let y = y_start + local_y;
                let in_row = &input[y * cols..(y + 1) * cols];
                for (x, out) in out_row.iter_mut().enumerate() {
                    *out = kernel
                        .iter()
                        .enumerate()
                        .map(|(k, &kv)| {
                            let sx = reflect_101(x as isize + k as isize - radius as isize, cols);
                            in_row[sx] * kv
                        })
                        .sum();
                }
            }
        });

    // Vertical pass
    let mut output = vec![0u8; rows * cols];
    output
        .par_chunks_mut(cols * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out_chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out_chunk.chunks_mut(cols).enumerate() {
                let y = y_start + local_y;
                for (x, out) in out_row.iter_mut().enumerate() {
                    let sum: f32 = kernel
                        .iter()
                        .enumerate()
                        .map(|(k, &kv)| {
                            let sy = reflect_101(y as isize + k as isize - radius as isize, rows);
                            temp[sy * cols + x] * kv
                        })
                        .sum();
                    *out = sum.round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    tracing::debug!(rows, cols, window, "Gaussian blur applied");

    Ok(Grid::new(rows, cols, output))
}

/// Mirror boundary handling. Repeats as often as needed so windows wider
/// than the image still land inside it.
#[inline]
pub(super) fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}
