//! Adaptive significance thresholding.
//!
//! Compares a lightly blurred copy of the frame (local signal) against a
//! heavily blurred copy (local background). The threshold at each pixel is
//! half of a modelled local standard deviation, which is largest where the
//! background sits at the equalized mean and falls linearly to zero at the
//! saturated extremes.

use common::Grid;

use crate::error::{Error, Result};

/// Mean of a uniform distribution over `[0, 255]`, which is what a globally
/// equalized frame approximates.
pub const EQUALIZED_MEAN: f64 = 127.5;

/// Standard deviation of a uniform distribution over `[0, 255]`.
pub const EQUALIZED_STD_DEV: f64 = 73.9;

/// Modelled standard deviation of the neighbourhood around a pixel whose
/// blurred background value is `background`.
#[inline]
pub fn local_std_dev(background: u8, sigma: f64) -> f64 {
    let deviation = (f64::from(background) - EQUALIZED_MEAN).abs();
    EQUALIZED_STD_DEV * (1.0 - deviation / EQUALIZED_MEAN) * sigma
}

#[inline]
fn is_significant(signal: u8, background: u8, sigma: f64) -> bool {
    f64::from(signal) > f64::from(background) + local_std_dev(background, sigma) / 2.0
}

/// Builds the binary significance mask for two equally shaped blurred frames.
pub fn compute_significance(
    signal: &Grid<u8>,
    background: &Grid<u8>,
    sigma: f64,
) -> Result<Grid<bool>> {
    if !signal.same_shape(background) {
        return Err(Error::InputShapeMismatch {
            signal: signal.shape(),
            background: background.shape(),
        });
    }
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(Error::InvalidSigma(sigma));
    }

    let cells = signal
        .iter()
        .zip(background.iter())
        .map(|(&s, &b)| is_significant(s, b, sigma))
        .collect();
    let mask = Grid::new(signal.rows(), signal.cols(), cells);

    tracing::debug!(
        rows = mask.rows(),
        cols = mask.cols(),
        sigma,
        significant = mask.iter().filter(|&&v| v).count(),
        "Significance mask computed"
    );

    Ok(mask)
}
